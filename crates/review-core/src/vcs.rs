//! Version-control collaborator.
//!
//! Worktree and range diffs come from libgit2 through `git2`; pull request
//! diffs come from the `gh` CLI. Any failure is surfaced as
//! `ReviewError::Vcs`; there is no retry.

use crate::diff;
use crate::error::{Result, ReviewError};
use git2::{DiffOptions, Repository};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Source of diffs and file listings for scope resolution.
pub trait Vcs {
    /// Unified diff of a pull request's changes.
    fn pr_diff(&self, pr: &str) -> Result<String>;

    /// Unified diff of the working copy (untracked files included) against
    /// `base` (normally `HEAD`).
    fn worktree_diff(&self, base: &str) -> Result<String>;

    /// Unified diff between two refs.
    fn range_diff(&self, from: &str, to: &str) -> Result<String>;

    /// Every tracked file, relative to the root. `None` when the root is not
    /// under version control.
    fn tracked_files(&self) -> Result<Option<Vec<String>>>;
}

/// The project's git repository, plus `gh` for pull requests.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn open(&self, command: &str) -> Result<Repository> {
        Repository::discover(&self.root).map_err(|e| vcs_error(command, e))
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        which::which(program).map_err(|_| ReviewError::ToolNotFound(program.to_string()))?;
        let command = format!("{program} {}", args.join(" "));
        tracing::debug!(%command, "running");

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| ReviewError::Vcs {
                command: command.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ReviewError::Vcs {
                command,
                stderr: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Workdir-relative prefix of the project root, for repositories
    /// discovered above it.
    fn root_prefix(&self, repo: &Repository) -> Option<String> {
        let workdir = repo.workdir()?.canonicalize().ok()?;
        let root = self.root.canonicalize().ok()?;
        let rel = root.strip_prefix(&workdir).ok()?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        Some(if rel.is_empty() { rel } else { format!("{rel}/") })
    }
}

fn vcs_error(command: &str, e: git2::Error) -> ReviewError {
    ReviewError::Vcs {
        command: command.to_string(),
        stderr: e.message().to_string(),
    }
}

fn worktree_patch(repo: &Repository, base: &str) -> std::result::Result<String, git2::Error> {
    let tree = repo.revparse_single(base)?.peel_to_tree()?;
    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);
    let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;
    diff::patch_text(&diff)
}

fn range_patch(repo: &Repository, from: &str, to: &str) -> std::result::Result<String, git2::Error> {
    let old = repo.revparse_single(from)?.peel_to_tree()?;
    let new = repo.revparse_single(to)?.peel_to_tree()?;
    let mut opts = DiffOptions::new();
    let diff = repo.diff_tree_to_tree(Some(&old), Some(&new), Some(&mut opts))?;
    diff::patch_text(&diff)
}

impl Vcs for GitRepo {
    fn pr_diff(&self, pr: &str) -> Result<String> {
        self.run("gh", &["pr", "diff", pr])
    }

    fn worktree_diff(&self, base: &str) -> Result<String> {
        let command = format!("git diff {base}");
        tracing::debug!(%command, "diffing worktree");
        let repo = self.open(&command)?;
        worktree_patch(&repo, base).map_err(|e| vcs_error(&command, e))
    }

    fn range_diff(&self, from: &str, to: &str) -> Result<String> {
        let command = format!("git diff {from}..{to}");
        tracing::debug!(%command, "diffing range");
        let repo = self.open(&command)?;
        range_patch(&repo, from, to).map_err(|e| vcs_error(&command, e))
    }

    fn tracked_files(&self) -> Result<Option<Vec<String>>> {
        let Ok(repo) = Repository::discover(&self.root) else {
            return Ok(None);
        };
        if repo.is_bare() {
            return Ok(None);
        }
        let prefix = self.root_prefix(&repo).unwrap_or_default();
        let index = repo.index().map_err(|e| vcs_error("git ls-files", e))?;
        let files = index
            .iter()
            .filter_map(|entry| String::from_utf8(entry.path).ok())
            .filter_map(|path| path.strip_prefix(&prefix).map(str::to_string))
            .collect();
        Ok(Some(files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{parse_unified, FileStatus};
    use git2::Signature;
    use tempfile::TempDir;

    fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => Vec::new(),
        };
        let parents: Vec<_> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    fn repo_with_commit() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn a() {}\n").unwrap();
        commit_all(&repo, "init");
        (dir, repo)
    }

    #[test]
    fn worktree_diff_includes_untracked_files() {
        let (dir, _repo) = repo_with_commit();
        std::fs::write(dir.path().join("src/lib.rs"), "fn a() {}\nfn b() {}\n").unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/nested/new.rs"), "fn c() {}\n").unwrap();

        let raw = GitRepo::new(dir.path()).worktree_diff("HEAD").unwrap();
        let files = parse_unified(&raw).unwrap();
        let lib = files.iter().find(|f| f.path == "src/lib.rs").unwrap();
        assert_eq!(lib.status, FileStatus::Modified);
        assert_eq!(lib.added().next().unwrap().new_line, Some(2));

        let new = files.iter().find(|f| f.path == "src/nested/new.rs").unwrap();
        assert_eq!(new.status, FileStatus::Added);
        assert_eq!(new.added().next().unwrap().text, "fn c() {}");
    }

    #[test]
    fn range_diff_compares_two_commits() {
        let (dir, repo) = repo_with_commit();
        let first = commit_all(&repo, "noop");
        std::fs::write(dir.path().join("CHANGELOG.md"), "# Changelog\n").unwrap();
        std::fs::remove_file(dir.path().join("src/lib.rs")).unwrap();
        let mut index = repo.index().unwrap();
        index.remove_path(Path::new("src/lib.rs")).unwrap();
        index.write().unwrap();
        let second = commit_all(&repo, "second");

        let raw = GitRepo::new(dir.path())
            .range_diff(&first.to_string(), &second.to_string())
            .unwrap();
        let files = parse_unified(&raw).unwrap();
        let statuses: Vec<_> = files.iter().map(|f| (f.path.as_str(), f.status)).collect();
        assert_eq!(
            statuses,
            [
                ("CHANGELOG.md", FileStatus::Added),
                ("src/lib.rs", FileStatus::Deleted)
            ]
        );
    }

    #[test]
    fn unknown_base_is_a_vcs_error() {
        let (dir, _repo) = repo_with_commit();
        let err = GitRepo::new(dir.path()).worktree_diff("no-such-ref").unwrap_err();
        match err {
            ReviewError::Vcs { command, .. } => assert_eq!(command, "git diff no-such-ref"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tracked_files_lists_the_index() {
        let (dir, _repo) = repo_with_commit();
        std::fs::write(dir.path().join("scratch.txt"), "x\n").unwrap();
        let files = GitRepo::new(dir.path()).tracked_files().unwrap().unwrap();
        assert_eq!(files, ["src/lib.rs"]);
    }

    #[test]
    fn tracked_files_outside_a_repo_is_none() {
        let dir = TempDir::new().unwrap();
        // Skipped when the temp dir itself sits inside a repository.
        if Repository::discover(dir.path()).is_err() {
            assert!(GitRepo::new(dir.path()).tracked_files().unwrap().is_none());
        }
    }
}

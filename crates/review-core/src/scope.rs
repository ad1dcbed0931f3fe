//! Scope resolution: turn a `ReviewRequest` into the concrete files (and
//! diff, when there is one) a review examines.

use crate::diff::{self, FileDiff, FileStatus};
use crate::error::{Result, ReviewError};
use crate::glob::PathFilter;
use crate::paths;
use crate::request::ReviewRequest;
use crate::types::Scope;
use crate::vcs::Vcs;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Bytes sniffed for NUL when deciding whether a file is binary.
const BINARY_SNIFF: usize = 8000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedFile {
    /// Forward-slash path relative to the project root.
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedScope {
    pub files: Vec<ScopedFile>,
    /// Unified diff restricted to `files`; `None` for file and repo scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip)]
    pub changes: Vec<FileDiff>,
}

impl ResolvedScope {
    /// Nothing left to review after filtering. Not an error: the review
    /// proceeds and reports zero findings.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.changes.is_empty()
    }

    pub fn file(&self, path: &str) -> Option<&ScopedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }
}

pub struct ScopeResolver<'a> {
    root: PathBuf,
    vcs: &'a dyn Vcs,
    exclude: PathFilter,
    max_file_bytes: u64,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(root: &Path, vcs: &'a dyn Vcs) -> Self {
        Self {
            root: root.to_path_buf(),
            vcs,
            exclude: PathFilter::default(),
            max_file_bytes: crate::config::DEFAULT_MAX_FILE_BYTES,
        }
    }

    /// Paths matching `exclude` are dropped before the request's own filter.
    pub fn with_exclude(mut self, exclude: PathFilter) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn resolve(&self, request: &ReviewRequest) -> Result<ResolvedScope> {
        let filter = PathFilter::new(request.paths())?;
        let keep = |path: &str| !self.exclude.excludes(path) && filter.matches(path);

        let resolved = match request.scope() {
            Scope::Pr => {
                let pr = request.pr_selector()?;
                let raw = self.vcs.pr_diff(&pr)?;
                self.from_diff(&raw, keep)?
            }
            Scope::Worktree => {
                let base = request.target().unwrap_or("HEAD");
                let raw = self.vcs.worktree_diff(base)?;
                self.from_diff(&raw, keep)?
            }
            Scope::Diff => {
                let range = request.ref_range()?;
                let raw = self.vcs.range_diff(&range.from, &range.to)?;
                self.from_diff(&raw, keep)?
            }
            Scope::File => self.from_targets(&request.file_targets(), keep)?,
            Scope::Repo => self.from_repo(keep)?,
        };

        if resolved.is_empty() {
            tracing::warn!(
                scope = %request.scope(),
                paths = ?request.paths(),
                "scope resolved to no files; the report will have no findings"
            );
        } else {
            tracing::debug!(files = resolved.files.len(), "resolved scope");
        }
        Ok(resolved)
    }

    fn from_diff(&self, raw: &str, keep: impl Fn(&str) -> bool) -> Result<ResolvedScope> {
        let changes: Vec<FileDiff> = diff::parse_unified(raw)?
            .into_iter()
            .filter(|f| keep(&f.path))
            .collect();

        let mut files = BTreeMap::new();
        for change in &changes {
            let content = if change.status == FileStatus::Deleted {
                String::new()
            } else {
                self.read(&self.root.join(&change.path)).unwrap_or_default()
            };
            files.insert(change.path.clone(), content);
        }

        Ok(ResolvedScope {
            files: into_files(files),
            diff: Some(diff::render(&changes)),
            changes,
        })
    }

    fn from_targets(&self, targets: &[String], keep: impl Fn(&str) -> bool) -> Result<ResolvedScope> {
        let absolute: Vec<PathBuf> = targets.iter().map(|t| self.root.join(t)).collect();
        // Every target is checked before anything is read.
        if let Some(missing) = absolute.iter().find(|p| !p.exists()) {
            return Err(ReviewError::FileNotFound(missing.clone()));
        }

        let mut found = Vec::new();
        for path in &absolute {
            if path.is_dir() {
                walk(path, &mut found)?;
            } else {
                found.push(path.clone());
            }
        }
        Ok(self.collect(found, keep))
    }

    fn from_repo(&self, keep: impl Fn(&str) -> bool) -> Result<ResolvedScope> {
        let found = match self.vcs.tracked_files()? {
            Some(tracked) => tracked.iter().map(|p| self.root.join(p)).collect(),
            None => {
                tracing::debug!("not a git repository; walking the tree");
                let mut found = Vec::new();
                walk(&self.root, &mut found)?;
                found
            }
        };
        Ok(self.collect(found, keep))
    }

    fn collect(&self, found: Vec<PathBuf>, keep: impl Fn(&str) -> bool) -> ResolvedScope {
        let mut files = BTreeMap::new();
        for path in found {
            let rel = paths::display_relative(&self.root, &path);
            if !keep(&rel) {
                continue;
            }
            if let Some(content) = self.read(&path) {
                files.insert(rel, content);
            }
        }
        ResolvedScope {
            files: into_files(files),
            diff: None,
            changes: Vec::new(),
        }
    }

    /// Read a text file; binary, oversized, or unreadable files yield `None`.
    fn read(&self, path: &Path) -> Option<String> {
        let meta = std::fs::metadata(path).ok()?;
        if !meta.is_file() {
            return None;
        }
        if meta.len() > self.max_file_bytes {
            tracing::warn!(path = %path.display(), bytes = meta.len(), "skipping oversized file");
            return None;
        }
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
                return None;
            }
        };
        if bytes[..bytes.len().min(BINARY_SNIFF)].contains(&0) {
            tracing::debug!(path = %path.display(), "skipping binary file");
            return None;
        }
        String::from_utf8(bytes).ok()
    }
}

fn into_files(files: BTreeMap<String, String>) -> Vec<ScopedFile> {
    files
        .into_iter()
        .map(|(path, content)| ScopedFile { path, content })
        .collect()
}

/// Collect regular files under `dir`, skipping tool and build directories.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if paths::SKIP_DIRS.contains(&name.to_string_lossy().as_ref()) {
                continue;
            }
            walk(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

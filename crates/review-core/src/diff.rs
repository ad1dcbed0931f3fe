//! Unified diff model.
//!
//! Patch text (from `gh pr diff`, or printed from a `git2::Diff`) is parsed by
//! libgit2 and converted into owned per-file sections so scope resolution and
//! extraction never hold a `git2` borrow.

use crate::error::{Result, ReviewError};
use git2::{Delta, Diff, DiffFormat, Patch};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
}

impl FileStatus {
    fn from_delta(delta: Delta) -> Self {
        match delta {
            Delta::Added | Delta::Untracked => Self::Added,
            Delta::Deleted => Self::Deleted,
            Delta::Renamed => Self::Renamed,
            _ => Self::Modified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Added,
    Removed,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line number in the old file (removed and context lines).
    pub old_line: Option<usize>,
    /// Line number in the new file (added and context lines).
    pub new_line: Option<usize>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: usize,
    pub new_start: usize,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub hunks: Vec<Hunk>,
    /// The section as patch text, headers included.
    #[serde(skip)]
    pub raw: String,
}

impl FileDiff {
    pub fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| h.lines.iter())
    }

    pub fn added(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines().filter(|l| l.kind == LineKind::Added)
    }

    pub fn removed(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines().filter(|l| l.kind == LineKind::Removed)
    }
}

/// Reassemble the raw sections of `files` into one diff.
pub fn render(files: &[FileDiff]) -> String {
    files.iter().map(|f| f.raw.as_str()).collect()
}

/// Parse git-style patch text (`diff --git` sections). Blank input is an
/// empty diff.
pub fn parse_unified(input: &str) -> Result<Vec<FileDiff>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    let diff = Diff::from_buffer(input.as_bytes()).map_err(invalid)?;
    from_git(&diff)
}

/// Print `diff` in patch format.
pub fn patch_text(diff: &Diff<'_>) -> std::result::Result<String, git2::Error> {
    let mut out = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            out.push(line.origin() as u8);
        }
        out.extend_from_slice(line.content());
        true
    })?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn invalid(e: git2::Error) -> ReviewError {
    ReviewError::InvalidDiff(e.message().to_string())
}

fn path_of(file: git2::DiffFile<'_>) -> Option<String> {
    file.path().map(|p| p.to_string_lossy().replace('\\', "/"))
}

fn from_git(diff: &Diff<'_>) -> Result<Vec<FileDiff>> {
    let mut files = Vec::with_capacity(diff.deltas().len());

    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let status = FileStatus::from_delta(delta.status());
        let new_path = path_of(delta.new_file());
        let old_path = path_of(delta.old_file());
        let Some(path) = new_path.clone().or_else(|| old_path.clone()) else {
            continue;
        };
        let old_path = old_path.filter(|old| status == FileStatus::Renamed && *old != path);

        let mut file = FileDiff {
            path,
            old_path,
            status,
            hunks: Vec::new(),
            raw: String::new(),
        };

        match Patch::from_diff(diff, idx).map_err(invalid)? {
            Some(mut patch) => {
                for h in 0..patch.num_hunks() {
                    let (hunk, count) = patch.hunk(h).map_err(invalid)?;
                    let mut lines = Vec::with_capacity(count);
                    for l in 0..count {
                        let line = patch.line_in_hunk(h, l).map_err(invalid)?;
                        let kind = match line.origin() {
                            '+' => LineKind::Added,
                            '-' => LineKind::Removed,
                            ' ' => LineKind::Context,
                            // End-of-file newline markers.
                            _ => continue,
                        };
                        let text = String::from_utf8_lossy(line.content());
                        lines.push(DiffLine {
                            kind,
                            old_line: line.old_lineno().map(|n| n as usize),
                            new_line: line.new_lineno().map(|n| n as usize),
                            text: text.trim_end_matches(['\n', '\r']).to_string(),
                        });
                    }
                    file.hunks.push(Hunk {
                        old_start: hunk.old_start() as usize,
                        new_start: hunk.new_start() as usize,
                        lines,
                    });
                }
                let buf = patch.to_buf().map_err(invalid)?;
                file.raw = String::from_utf8_lossy(&buf).into_owned();
            }
            // Binary or unchanged: keep the section header so rendering still names it.
            None => {
                let old = file.old_path.as_deref().unwrap_or(&file.path);
                file.raw = format!("diff --git a/{old} b/{}\n", file.path);
            }
        }
        files.push(file);
    }
    Ok(files)
}

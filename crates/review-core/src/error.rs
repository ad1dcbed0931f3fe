use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("no session found: create one with 'review session create <slug>' or pass --session")]
    NoSessionFound,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already exists: {0}")]
    SessionExists(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("scope '{scope}' requires a target")]
    MissingTarget { scope: String },

    #[error("invalid target '{target}' for scope '{scope}': expected {expected}")]
    InvalidTargetFormat {
        scope: String,
        target: String,
        expected: String,
    },

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error(
        "partial write for {}: report written = {report_written}, index updated = {index_written}: {source}",
        .report_path.display()
    )]
    PartialWrite {
        report_path: PathBuf,
        report_written: bool,
        index_written: bool,
        #[source]
        source: Box<ReviewError>,
    },

    #[error("'{command}' failed: {stderr}")]
    Vcs { command: String, stderr: String },

    #[error("malformed diff: {0}")]
    InvalidDiff(String),

    #[error("required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("invalid scope: {0} (expected pr, worktree, diff, repo, or file)")]
    InvalidScope(String),

    #[error("invalid review domain: {0}")]
    InvalidDomain(String),

    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("invalid confidence: {0}")]
    InvalidConfidence(String),

    #[error("invalid glob '{glob}': {reason}")]
    InvalidGlob { glob: String, reason: String },

    #[error("timed out waiting for lock on {}", .0.display())]
    LockTimeout(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReviewError>;

//! Session registry: the markdown table in `.claude/README.md`.
//!
//! The registry is read as a snapshot at the start of an invocation. New
//! sessions are appended as table rows under the registry lock; existing rows
//! are never rewritten.

use crate::error::{Result, ReviewError};
use crate::{io, paths};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const REGISTRY_HEADER: &str =
    "# Sessions\n\n| Session | Created | Status |\n|---------|---------|--------|\n";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    /// Lenient parse: anything that reads as finished is closed, the rest open.
    fn parse_lenient(s: &str) -> Self {
        let s = s.trim().to_ascii_lowercase();
        if ["closed", "done", "complete", "completed", "merged", "archived"]
            .iter()
            .any(|w| s.contains(w))
        {
            SessionStatus::Closed
        } else {
            SessionStatus::Open
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Open => f.write_str("open"),
            SessionStatus::Closed => f.write_str("closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub slug: String,
    pub created_at: NaiveDate,
    pub status: SessionStatus,
}

impl Session {
    /// A session not listed in the registry, identified only by its directory.
    pub fn unregistered(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            created_at: Utc::now().date_naive(),
            status: SessionStatus::Open,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    /// Snapshot the registry. Missing, unreadable, or empty registries are
    /// all `NoSessionFound`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::registry_path(root);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "session registry unreadable");
                return Err(ReviewError::NoSessionFound);
            }
        };
        let registry = Self::parse(&content);
        if registry.sessions.is_empty() {
            return Err(ReviewError::NoSessionFound);
        }
        Ok(registry)
    }

    /// Parse the first markdown table whose header has a `Session` and a
    /// `Created` column. Rows without a parseable date are skipped.
    pub fn parse(content: &str) -> Self {
        let mut sessions = Vec::new();
        let mut columns: Option<(usize, usize, Option<usize>)> = None;

        for line in content.lines() {
            let line = line.trim();
            if !line.starts_with('|') {
                if columns.is_some() && !sessions.is_empty() {
                    break;
                }
                continue;
            }
            let cells = split_row(line);
            if is_separator(&cells) {
                continue;
            }
            let Some((slug_col, created_col, status_col)) = columns else {
                columns = header_columns(&cells);
                continue;
            };

            let Some(slug) = cells.get(slug_col).map(|c| clean_slug(c)) else {
                continue;
            };
            let Some(created_at) = cells.get(created_col).and_then(|c| parse_date(c)) else {
                tracing::debug!(row = line, "skipping registry row without a date");
                continue;
            };
            if slug.is_empty() {
                continue;
            }
            let status = status_col
                .and_then(|i| cells.get(i))
                .map(|c| SessionStatus::parse_lenient(c))
                .unwrap_or(SessionStatus::Open);
            sessions.push(Session {
                slug,
                created_at,
                status,
            });
        }

        Self { sessions }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, slug: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.slug == slug)
    }

    /// The most recently created session. Equal dates resolve to the row
    /// that appears last in the table.
    pub fn latest(&self) -> Result<&Session> {
        self.sessions
            .iter()
            .enumerate()
            .max_by_key(|(i, s)| (s.created_at, *i))
            .map(|(_, s)| s)
            .ok_or(ReviewError::NoSessionFound)
    }

    /// Append a new open session row and create its directory index.
    ///
    /// The duplicate check and the append happen under the registry lock.
    pub fn create(root: &Path, slug: &str) -> Result<Session> {
        paths::validate_slug(slug)?;
        let registry_path = paths::registry_path(root);

        let session = Session {
            slug: slug.to_string(),
            created_at: Utc::now().date_naive(),
            status: SessionStatus::Open,
        };
        {
            let _guard = io::acquire_lock(&registry_path, io::LOCK_TIMEOUT)?;
            let existing = match std::fs::read_to_string(&registry_path) {
                Ok(content) => Self::parse(&content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(e) => return Err(e.into()),
            };
            if existing.get(slug).is_some() {
                return Err(ReviewError::SessionExists(slug.to_string()));
            }
            let row = format!(
                "| {} | {} | {} |\n",
                session.slug,
                session.created_at.format("%Y-%m-%d"),
                session.status
            );
            io::append_with_header(&registry_path, REGISTRY_HEADER, &row)?;
        }

        let index = paths::session_index_path(root, slug);
        io::append_locked(&index, &paths::session_index_header(slug), "")?;
        tracing::info!(session = slug, "created session");
        Ok(session)
    }
}

/// Resolve the session to file reports under.
///
/// An explicit slug must be a registry row or an existing `.claude/<slug>/`
/// directory. Without one, the most recently created registry row wins.
pub fn locate(root: &Path, explicit: Option<&str>) -> Result<Session> {
    match explicit {
        Some(slug) => {
            paths::validate_slug(slug)?;
            if let Ok(registry) = SessionRegistry::load(root) {
                if let Some(session) = registry.get(slug) {
                    return Ok(session.clone());
                }
            }
            if paths::session_dir(root, slug).is_dir() {
                return Ok(Session::unregistered(slug));
            }
            Err(ReviewError::SessionNotFound(slug.to_string()))
        }
        None => {
            let registry = SessionRegistry::load(root)?;
            let latest = registry.latest()?.clone();
            tracing::debug!(session = %latest.slug, "inferred latest session");
            Ok(latest)
        }
    }
}

// ---------------------------------------------------------------------------
// Table helpers
// ---------------------------------------------------------------------------

fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

fn header_columns(cells: &[String]) -> Option<(usize, usize, Option<usize>)> {
    let find = |name: &str| {
        cells
            .iter()
            .position(|c| c.to_ascii_lowercase().trim_matches('*') == name)
    };
    let slug = find("session").or_else(|| find("slug"))?;
    let created = find("created").or_else(|| find("date"))?;
    Some((slug, created, find("status")))
}

/// Strip markdown decoration: `` `slug` ``, `[slug](path)`, `**slug**`.
fn clean_slug(cell: &str) -> String {
    let mut s = cell.trim();
    if let Some(rest) = s.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            s = &rest[..end];
        }
    }
    s.trim_matches(|c| c == '`' || c == '*' || c == ' ').to_string()
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim().trim_matches('`');
    let head = cell.get(..10).unwrap_or(cell);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

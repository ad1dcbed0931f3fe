use crate::error::{Result, ReviewError};
use crate::types::Domain;
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CLAUDE_DIR: &str = ".claude";
pub const REGISTRY_FILE: &str = ".claude/README.md";
pub const CONFIG_FILE: &str = ".claude/review.yaml";

pub const SESSION_INDEX: &str = "README.md";
pub const REVIEWS_DIR: &str = "reviews";

/// Directories never descended into when walking a tree.
pub const SKIP_DIRS: &[&str] = &[".git", ".claude", "target", "node_modules"];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn claude_dir(root: &Path) -> PathBuf {
    root.join(CLAUDE_DIR)
}

pub fn registry_path(root: &Path) -> PathBuf {
    root.join(REGISTRY_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn session_dir(root: &Path, slug: &str) -> PathBuf {
    claude_dir(root).join(slug)
}

pub fn session_index_path(root: &Path, slug: &str) -> PathBuf {
    session_dir(root, slug).join(SESSION_INDEX)
}

/// Heading a new session index starts with.
pub fn session_index_header(slug: &str) -> String {
    format!("# {slug}\n\n## Artifacts\n\n")
}

pub fn reviews_dir(root: &Path, slug: &str, reviews: &str) -> PathBuf {
    session_dir(root, slug).join(reviews)
}

/// `<domain>-<date>.md`, the first-choice report filename.
pub fn report_filename(domain: Domain, date: NaiveDate) -> String {
    format!("{}-{}.md", domain.as_str(), date.format("%Y-%m-%d"))
}

/// The first `<domain>-<date>[-N].md` under `dir` that does not exist yet.
pub fn next_report_path(dir: &Path, domain: Domain, date: NaiveDate) -> PathBuf {
    let first = dir.join(report_filename(domain, date));
    if !first.exists() {
        return first;
    }
    let stem = format!("{}-{}", domain.as_str(), date.format("%Y-%m-%d"));
    let mut n = 2u32;
    loop {
        let candidate = dir.join(format!("{stem}-{n}.md"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Render `path` relative to `root` with forward slashes.
pub fn display_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("slug regex is valid")
    })
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(ReviewError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn valid_slugs() {
        for slug in ["add-api-endpoint", "a", "fix-auth-bug", "x1"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in ["", "-lead", "trail-", "has spaces", "UPPER", "a_b", "../up"] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            registry_path(root),
            PathBuf::from("/tmp/proj/.claude/README.md")
        );
        assert_eq!(
            session_index_path(root, "add-api-endpoint"),
            PathBuf::from("/tmp/proj/.claude/add-api-endpoint/README.md")
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        assert_eq!(
            report_filename(Domain::Migrations, date),
            "migrations-2024-01-16.md"
        );
    }

    #[test]
    fn next_report_path_suffixes_existing() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let first = next_report_path(dir.path(), Domain::Release, date);
        assert!(first.ends_with("release-2024-01-16.md"));
        std::fs::write(&first, "x").unwrap();
        let second = next_report_path(dir.path(), Domain::Release, date);
        assert!(second.ends_with("release-2024-01-16-2.md"));
    }

    #[test]
    fn display_relative_uses_forward_slashes() {
        let root = Path::new("/tmp/proj");
        let p = root.join("src").join("api").join("users.rs");
        assert_eq!(display_relative(root, &p), "src/api/users.rs");
    }
}

//! Free-text review context (`--context "PostgreSQL 14, strict backward
//! compatibility"`) reduced to the few parameters the rule tables read.
//!
//! Parsing is a table of case-insensitive substring hints. It never fails:
//! text that matches nothing is kept in `raw` and otherwise ignored.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbEngine {
    Postgres,
    Mysql,
    Sqlite,
    SqlServer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextHints {
    pub raw: String,
    /// Any removed or changed field in a public contract blocks the merge.
    pub strict_backcompat: bool,
    /// The API has external consumers.
    pub public_api: bool,
    pub db_engine: Option<DbEngine>,
    pub db_version: Option<u32>,
    /// Deploys must not take locks or break the running version.
    pub zero_downtime: bool,
    /// Tables are large enough that rewrites and backfills are slow.
    pub large_tables: bool,
    /// Latency objective in milliseconds.
    pub slo_ms: Option<u32>,
    pub framework: Option<String>,
    pub mobile_first: bool,
    /// Hotfix releases relax changelog and process checks.
    pub hotfix: bool,
}

type Apply = fn(&mut ContextHints);

/// Known substrings and the override each one applies.
const HINTS: &[(&str, Apply)] = &[
    ("strict backward compat", |h| h.strict_backcompat = true),
    ("strict backwards compat", |h| h.strict_backcompat = true),
    ("no breaking changes", |h| h.strict_backcompat = true),
    ("public api", |h| h.public_api = true),
    ("external consumers", |h| h.public_api = true),
    ("third-party clients", |h| h.public_api = true),
    ("postgres", |h| h.db_engine = Some(DbEngine::Postgres)),
    ("mysql", |h| h.db_engine = Some(DbEngine::Mysql)),
    ("mariadb", |h| h.db_engine = Some(DbEngine::Mysql)),
    ("sqlite", |h| h.db_engine = Some(DbEngine::Sqlite)),
    ("sql server", |h| h.db_engine = Some(DbEngine::SqlServer)),
    ("mssql", |h| h.db_engine = Some(DbEngine::SqlServer)),
    ("zero downtime", |h| h.zero_downtime = true),
    ("zero-downtime", |h| h.zero_downtime = true),
    ("online migration", |h| h.zero_downtime = true),
    ("large table", |h| h.large_tables = true),
    ("millions of rows", |h| h.large_tables = true),
    ("billions of rows", |h| h.large_tables = true),
    ("react", |h| h.framework = Some("react".into())),
    ("next.js", |h| h.framework = Some("nextjs".into())),
    ("nextjs", |h| h.framework = Some("nextjs".into())),
    ("vue", |h| h.framework = Some("vue".into())),
    ("svelte", |h| h.framework = Some("svelte".into())),
    ("angular", |h| h.framework = Some("angular".into())),
    ("mobile", |h| h.mobile_first = true),
    ("hotfix", |h| h.hotfix = true),
];

static DB_VERSION_RE: OnceLock<Regex> = OnceLock::new();
static SLO_RE: OnceLock<Regex> = OnceLock::new();

fn db_version_re() -> &'static Regex {
    DB_VERSION_RE.get_or_init(|| {
        Regex::new(r"(?i)(?:postgres(?:ql)?|mysql|mariadb|sqlite|sql server)\s*v?(\d+)")
            .expect("db version regex is valid")
    })
}

fn slo_re() -> &'static Regex {
    SLO_RE.get_or_init(|| {
        Regex::new(r"(?i)(?:p\d{2}|slo|latency)[^\d]{0,20}(\d+)\s*(ms|s)\b")
            .expect("slo regex is valid")
    })
}

impl ContextHints {
    pub fn parse(text: Option<&str>) -> Self {
        let raw = text.unwrap_or_default().trim().to_string();
        let mut hints = ContextHints {
            raw: raw.clone(),
            ..Default::default()
        };
        if raw.is_empty() {
            return hints;
        }

        let lower = raw.to_ascii_lowercase();
        for (needle, apply) in HINTS {
            if lower.contains(needle) {
                apply(&mut hints);
            }
        }

        hints.db_version = db_version_re()
            .captures(&raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        hints.slo_ms = slo_re().captures(&raw).and_then(|c| {
            let n: u32 = c.get(1)?.as_str().parse().ok()?;
            match c.get(2)?.as_str().to_ascii_lowercase().as_str() {
                "s" => n.checked_mul(1000),
                _ => Some(n),
            }
        });

        if hints.strict_backcompat {
            hints.public_api = true;
        }
        tracing::debug!(?hints, "parsed review context");
        hints
    }

    /// Postgres before 11 rewrites the table for `ADD COLUMN ... DEFAULT`.
    pub fn default_rewrites_table(&self) -> bool {
        match self.db_engine {
            Some(DbEngine::Postgres) => self.db_version.map(|v| v < 11).unwrap_or(false),
            Some(DbEngine::Mysql) => self.db_version.map(|v| v < 8).unwrap_or(false),
            _ => false,
        }
    }

    /// Whether the engine runs DDL inside transactions.
    pub fn transactional_ddl(&self) -> bool {
        matches!(self.db_engine, Some(DbEngine::Postgres) | Some(DbEngine::Sqlite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_is_default() {
        assert_eq!(ContextHints::parse(None), ContextHints::default());
        assert_eq!(ContextHints::parse(Some("   ")), ContextHints::default());
    }

    #[test]
    fn recognizes_known_hints() {
        let h = ContextHints::parse(Some(
            "PostgreSQL 14, strict backward compatibility, zero downtime deploys",
        ));
        assert!(h.strict_backcompat);
        assert!(h.public_api);
        assert!(h.zero_downtime);
        assert_eq!(h.db_engine, Some(DbEngine::Postgres));
        assert_eq!(h.db_version, Some(14));
        assert!(!h.default_rewrites_table());
        assert!(h.transactional_ddl());
    }

    #[test]
    fn old_postgres_rewrites_on_default() {
        let h = ContextHints::parse(Some("postgres 10 with millions of rows"));
        assert!(h.default_rewrites_table());
        assert!(h.large_tables);
    }

    #[test]
    fn slo_in_ms_and_seconds() {
        assert_eq!(
            ContextHints::parse(Some("p99 latency under 250ms")).slo_ms,
            Some(250)
        );
        assert_eq!(ContextHints::parse(Some("SLO: 2 s")).slo_ms, Some(2000));
    }

    #[test]
    fn unknown_text_is_kept_not_rejected() {
        let text = "¯\\_(ツ)_/¯ ship it {{}} ;; DROP";
        let h = ContextHints::parse(Some(text));
        assert_eq!(h.raw, text);
        assert!(!h.strict_backcompat);
        assert!(h.db_engine.is_none());
    }

    #[test]
    fn framework_and_hotfix() {
        let h = ContextHints::parse(Some("React app, mobile-first, hotfix for checkout"));
        assert_eq!(h.framework.as_deref(), Some("react"));
        assert!(h.mobile_first);
        assert!(h.hotfix);
    }
}

use super::{has, set_finding};
use crate::checklist::Check;
use crate::context::{ContextHints, DbEngine};
use crate::extract::{is_migration, is_sql, Artifact, ArtifactKind, Change, LinePattern};
use crate::types::{Confidence, Finding, Severity};
use std::collections::BTreeSet;

const CATEGORY_LOCKING: &str = "locking";
const CATEGORY_COMPAT: &str = "compatibility";
const CATEGORY_ROLLBACK: &str = "rollback";
const CATEGORY_DATA: &str = "data";

const EXISTS_AFTER: &[Change] = &[Change::Added, Change::Present];

pub(super) fn file_kind(path: &str) -> Option<ArtifactKind> {
    is_migration(path).then_some(ArtifactKind::MigrationFile)
}

fn schema_file(path: &str) -> bool {
    is_migration(path) || is_sql(path)
}

pub(super) fn patterns() -> Vec<LinePattern> {
    let p = |kind: ArtifactKind, pattern: &'static str| LinePattern {
        kind,
        files: schema_file,
        pattern,
    };
    vec![
        p(ArtifactKind::CreateTable, r"(?i)\bcreate\s+table\b|\bcreate_table\b|op\.create_table\("),
        p(ArtifactKind::AddColumn, r"(?i)\badd\s+column\b|\badd_column\b|op\.add_column\("),
        p(ArtifactKind::DropColumn, r"(?i)\bdrop\s+column\b|\bremove_column\b|op\.drop_column\("),
        p(ArtifactKind::DropTable, r"(?i)\bdrop\s+table\b|\bdrop_table\b|op\.drop_table\("),
        p(ArtifactKind::RenameColumn, r"(?i)\brename\s+column\b|\brename_column\b|\bnew_column_name\s*="),
        p(
            ArtifactKind::AlterColumnType,
            r"(?i)\balter\s+column\s+\S+\s+(set\s+data\s+)?type\b|\bmodify\s+column\b|\bchange_column\b|\btype_\s*=",
        ),
        p(ArtifactKind::CreateIndex, r"(?i)\bcreate\s+(unique\s+)?index\b|\badd_index\b|op\.create_index\("),
        p(
            ArtifactKind::AddConstraint,
            r"(?i)\badd\s+constraint\b|\bforeign\s+key\b|\bset\s+not\s+null\b|\badd_foreign_key\b",
        ),
        p(ArtifactKind::BulkWrite, r"(?i)^\s*(update\s+\w|delete\s+from\b|insert\s+into\b.*\bselect\b)"),
        p(
            ArtifactKind::DownMigration,
            r"(?i)^\s*--\s*\+?migrate\s+down|^\s*--\s*down\b|\bdef\s+(down|downgrade)\b|\bexports\.down\b|\basync\s+down\s*\(|\bfn\s+down\s*\(",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Escalate when deploys must stay online.
fn online_escalates(base: Severity, hints: &ContextHints) -> Severity {
    if hints.zero_downtime {
        base.escalate()
    } else {
        base
    }
}

/// Escalate for big tables, where rewrites and scans take minutes.
fn size_escalates(base: Severity, hints: &ContextHints) -> Severity {
    if hints.large_tables || hints.zero_downtime {
        base.escalate()
    } else {
        base
    }
}

fn not_null_without_default(a: &Artifact, _: &ContextHints) -> bool {
    has(a, "not null") && !has(a, "default")
}

fn default_rewrites(a: &Artifact, hints: &ContextHints) -> bool {
    has(a, "default") && hints.default_rewrites_table()
}

fn index_blocks_writes(a: &Artifact, hints: &ContextHints) -> bool {
    let online_engine = matches!(hints.db_engine, None | Some(DbEngine::Postgres));
    online_engine && !has(a, "concurrently") && !has(a, "algorithm=inplace")
}

fn constraint_validates(a: &Artifact, _: &ContextHints) -> bool {
    !has(a, "not valid")
}

fn unbounded_write(a: &Artifact, _: &ContextHints) -> bool {
    !has(a, " where ") && !has(a, " limit ")
}

// ---------------------------------------------------------------------------
// Set rules
// ---------------------------------------------------------------------------

fn is_rollback_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("down") || lower.contains("rollback") || lower.contains("revert")
}

/// New migration files with no down step, unless a companion rollback file
/// is part of the same scope.
fn missing_down(artifacts: &[Artifact], _hints: &ContextHints) -> Vec<Finding> {
    let with_down: BTreeSet<&str> = artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::DownMigration)
        .map(|a| a.file.as_str())
        .collect();
    let has_rollback_file = artifacts
        .iter()
        .any(|a| a.kind == ArtifactKind::MigrationFile && is_rollback_file(&a.file));

    artifacts
        .iter()
        .filter(|a| {
            a.kind == ArtifactKind::MigrationFile
                && matches!(a.change, Change::Added | Change::Present)
                && !is_rollback_file(&a.file)
                && !with_down.contains(a.file.as_str())
                && !has_rollback_file
        })
        .map(|a| {
            set_finding(
                "missing-down-migration",
                CATEGORY_ROLLBACK,
                "Migration has no rollback step",
                Severity::Med,
                Confidence::Low,
                a,
                format!("{}: no down/rollback section found", a.file),
                "Add a down migration, or document why the change is irreversible and how to restore.",
            )
        })
        .collect()
}

/// DDL plus data changes in the same file on an engine without transactional
/// DDL: a failure halfway leaves the schema partly applied.
fn mixed_ddl_and_data(artifacts: &[Artifact], hints: &ContextHints) -> Vec<Finding> {
    if hints.db_engine.is_none() || hints.transactional_ddl() {
        return Vec::new();
    }
    let ddl_files: BTreeSet<&str> = artifacts
        .iter()
        .filter(|a| a.exists_after() && !a.is_file_level() && a.kind != ArtifactKind::BulkWrite)
        .map(|a| a.file.as_str())
        .collect();
    let mut seen = BTreeSet::new();
    artifacts
        .iter()
        .filter(|a| {
            a.kind == ArtifactKind::BulkWrite
                && a.exists_after()
                && ddl_files.contains(a.file.as_str())
                && seen.insert(a.file.clone())
        })
        .map(|a| {
            set_finding(
                "mixed-ddl-and-data",
                CATEGORY_DATA,
                "Schema and data changes mixed without transactional DDL",
                Severity::Med,
                Confidence::Med,
                a,
                a.snippet.clone(),
                "Split schema and data changes into separate migrations.",
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

pub(super) fn rules() -> Vec<Check> {
    vec![
        rule! {
            id: "not-null-without-default",
            category: CATEGORY_LOCKING,
            kinds: &[ArtifactKind::AddColumn],
            severity: |_, _| Severity::Blocker,
            confidence: Confidence::High,
            title: "ADD COLUMN NOT NULL without DEFAULT",
            changes: EXISTS_AFTER,
            condition: not_null_without_default,
            remediation: "Add the column nullable, backfill in batches, then add the NOT NULL constraint."
        },
        rule! {
            id: "drop-column",
            category: CATEGORY_COMPAT,
            kinds: &[ArtifactKind::DropColumn],
            severity: |_, h| online_escalates(Severity::High, h),
            confidence: Confidence::Med,
            title: "Column dropped while old code may still read it",
            changes: EXISTS_AFTER,
            remediation: "Follow expand/contract: stop reading the column, deploy, then drop it in a later release."
        },
        rule! {
            id: "drop-table",
            category: CATEGORY_COMPAT,
            kinds: &[ArtifactKind::DropTable],
            severity: |_, h| online_escalates(Severity::High, h),
            confidence: Confidence::Med,
            title: "Table dropped",
            changes: EXISTS_AFTER,
            remediation: "Confirm nothing reads the table and a backup exists; prefer renaming first."
        },
        rule! {
            id: "rename-column",
            category: CATEGORY_COMPAT,
            kinds: &[ArtifactKind::RenameColumn],
            severity: |_, h| online_escalates(Severity::High, h),
            confidence: Confidence::High,
            title: "Column rename breaks the running version",
            changes: EXISTS_AFTER,
            remediation: "Add the new column, dual-write, backfill, switch reads, then drop the old column."
        },
        rule! {
            id: "alter-column-type",
            category: CATEGORY_LOCKING,
            kinds: &[ArtifactKind::AlterColumnType],
            severity: |_, h| size_escalates(Severity::High, h),
            confidence: Confidence::Med,
            title: "Column type change rewrites the table",
            changes: EXISTS_AFTER,
            remediation: "Add a new column of the target type and migrate with expand/contract."
        },
        rule! {
            id: "default-rewrites-table",
            category: CATEGORY_LOCKING,
            kinds: &[ArtifactKind::AddColumn],
            severity: |_, h| size_escalates(Severity::High, h),
            confidence: Confidence::High,
            title: "ADD COLUMN with DEFAULT rewrites the table on this engine version",
            changes: EXISTS_AFTER,
            condition: default_rewrites,
            remediation: "Add the column without a default, set the default separately, backfill in batches."
        },
        rule! {
            id: "index-without-concurrently",
            category: CATEGORY_LOCKING,
            kinds: &[ArtifactKind::CreateIndex],
            severity: |_, h| size_escalates(Severity::Med, h),
            confidence: Confidence::High,
            title: "Index build blocks writes",
            changes: EXISTS_AFTER,
            condition: index_blocks_writes,
            remediation: "Use CREATE INDEX CONCURRENTLY (outside a transaction) on existing tables."
        },
        rule! {
            id: "constraint-validation-scan",
            category: CATEGORY_LOCKING,
            kinds: &[ArtifactKind::AddConstraint],
            severity: |_, h| size_escalates(Severity::Med, h),
            confidence: Confidence::Low,
            title: "Constraint validated under lock",
            changes: EXISTS_AFTER,
            condition: constraint_validates,
            remediation: "Add the constraint NOT VALID, then VALIDATE CONSTRAINT in a separate step."
        },
        rule! {
            id: "unbatched-data-change",
            category: CATEGORY_DATA,
            kinds: &[ArtifactKind::BulkWrite],
            severity: |_, h| size_escalates(Severity::Med, h),
            confidence: Confidence::Low,
            title: "Unbatched data change inside a migration",
            changes: EXISTS_AFTER,
            condition: unbounded_write,
            remediation: "Backfill in bounded batches from a separate job, not inside the schema migration."
        },
        set_rule! {
            id: "mixed-ddl-and-data",
            category: CATEGORY_DATA,
            title: "Schema and data changes mixed without transactional DDL",
            evaluate: mixed_ddl_and_data
        },
        set_rule! {
            id: "missing-down-migration",
            category: CATEGORY_ROLLBACK,
            title: "Migration has no rollback step",
            evaluate: missing_down
        },
    ]
}

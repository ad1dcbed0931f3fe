//! Artifact extraction: the slices of a resolved scope that one review
//! domain cares about.
//!
//! With a diff, only added and removed lines are classified. Without one
//! (file and repo scopes) every line of every file is. Each domain supplies a
//! file classifier and a table of line patterns; see `rules::<domain>`.

use crate::context::ContextHints;
use crate::diff::{FileStatus, LineKind};
use crate::rules;
use crate::scope::ResolvedScope;
use crate::types::Domain;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    // Whole files.
    SourceFile,
    TestFile,
    ApiSpecFile,
    MigrationFile,
    Changelog,
    Manifest,

    // api-contracts
    Endpoint,
    SchemaField,
    RequiredField,
    StatusCode,
    VersionMarker,
    Deprecation,

    // frontend-performance
    HeavyImport,
    EffectHook,
    InlineHandler,
    ImageTag,
    SyncScript,
    ListRender,
    LayoutRead,

    // migrations
    CreateTable,
    AddColumn,
    DropColumn,
    DropTable,
    RenameColumn,
    AlterColumnType,
    CreateIndex,
    AddConstraint,
    BulkWrite,
    DownMigration,

    // release
    VersionField,
    ChangelogEntry,
    DependencyChange,
    FeatureFlag,
    TodoMarker,
    DebugArtifact,

    // reliability
    OutboundCall,
    TimeoutConfig,
    RetryLoop,
    PanicPath,
    SwallowedError,
    UnboundedQueue,
    LockAcquire,

    // testing
    TestBlock,
    Assertion,
    SkippedTest,
    FocusedTest,
    SleepInTest,
    Snapshot,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::SourceFile => "source_file",
            ArtifactKind::TestFile => "test_file",
            ArtifactKind::ApiSpecFile => "api_spec_file",
            ArtifactKind::MigrationFile => "migration_file",
            ArtifactKind::Changelog => "changelog",
            ArtifactKind::Manifest => "manifest",
            ArtifactKind::Endpoint => "endpoint",
            ArtifactKind::SchemaField => "schema_field",
            ArtifactKind::RequiredField => "required_field",
            ArtifactKind::StatusCode => "status_code",
            ArtifactKind::VersionMarker => "version_marker",
            ArtifactKind::Deprecation => "deprecation",
            ArtifactKind::HeavyImport => "heavy_import",
            ArtifactKind::EffectHook => "effect_hook",
            ArtifactKind::InlineHandler => "inline_handler",
            ArtifactKind::ImageTag => "image_tag",
            ArtifactKind::SyncScript => "sync_script",
            ArtifactKind::ListRender => "list_render",
            ArtifactKind::LayoutRead => "layout_read",
            ArtifactKind::CreateTable => "create_table",
            ArtifactKind::AddColumn => "add_column",
            ArtifactKind::DropColumn => "drop_column",
            ArtifactKind::DropTable => "drop_table",
            ArtifactKind::RenameColumn => "rename_column",
            ArtifactKind::AlterColumnType => "alter_column_type",
            ArtifactKind::CreateIndex => "create_index",
            ArtifactKind::AddConstraint => "add_constraint",
            ArtifactKind::BulkWrite => "bulk_write",
            ArtifactKind::DownMigration => "down_migration",
            ArtifactKind::VersionField => "version_field",
            ArtifactKind::ChangelogEntry => "changelog_entry",
            ArtifactKind::DependencyChange => "dependency_change",
            ArtifactKind::FeatureFlag => "feature_flag",
            ArtifactKind::TodoMarker => "todo_marker",
            ArtifactKind::DebugArtifact => "debug_artifact",
            ArtifactKind::OutboundCall => "outbound_call",
            ArtifactKind::TimeoutConfig => "timeout_config",
            ArtifactKind::RetryLoop => "retry_loop",
            ArtifactKind::PanicPath => "panic_path",
            ArtifactKind::SwallowedError => "swallowed_error",
            ArtifactKind::UnboundedQueue => "unbounded_queue",
            ArtifactKind::LockAcquire => "lock_acquire",
            ArtifactKind::TestBlock => "test_block",
            ArtifactKind::Assertion => "assertion",
            ArtifactKind::SkippedTest => "skipped_test",
            ArtifactKind::FocusedTest => "focused_test",
            ArtifactKind::SleepInTest => "sleep_in_test",
            ArtifactKind::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// How the artifact relates to the change under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Added,
    Removed,
    /// A whole file touched by the diff without being added or removed.
    Modified,
    /// No diff: the content is simply there.
    Present,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub file: String,
    /// 1-based line, or 0 for whole-file artifacts.
    pub line: usize,
    pub snippet: String,
    pub kind: ArtifactKind,
    pub change: Change,
}

impl Artifact {
    pub fn is_file_level(&self) -> bool {
        self.line == 0
    }

    /// Added or simply present: the content exists after the change.
    pub fn exists_after(&self) -> bool {
        matches!(self.change, Change::Added | Change::Present | Change::Modified)
    }
}

// ---------------------------------------------------------------------------
// Line patterns
// ---------------------------------------------------------------------------

/// One classifier row: lines in files accepted by `files` that match `pattern`
/// become artifacts of `kind`.
pub struct LinePattern {
    pub kind: ArtifactKind,
    pub files: fn(&str) -> bool,
    pub pattern: &'static str,
}

struct CompiledPattern {
    kind: ArtifactKind,
    files: fn(&str) -> bool,
    re: Regex,
}

/// The extractor for one domain.
pub struct Extractor {
    domain: Domain,
    file_kind: fn(&str) -> Option<ArtifactKind>,
    patterns: Vec<CompiledPattern>,
}

/// Extracted artifacts plus the parsed context that travels with them.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub artifacts: Vec<Artifact>,
    pub hints: ContextHints,
}

impl Extractor {
    pub fn for_domain(domain: Domain) -> Self {
        let (file_kind, table) = rules::extraction_table(domain);
        let patterns = table
            .into_iter()
            .filter_map(|p| match Regex::new(p.pattern) {
                Ok(re) => Some(CompiledPattern {
                    kind: p.kind,
                    files: p.files,
                    re,
                }),
                Err(e) => {
                    tracing::error!(kind = %p.kind, error = %e, "invalid extraction pattern");
                    None
                }
            })
            .collect();
        Self {
            domain,
            file_kind,
            patterns,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn extract(&self, scope: &ResolvedScope, context: Option<&str>) -> Extraction {
        let hints = ContextHints::parse(context);
        let mut artifacts = Vec::new();

        if scope.diff.is_some() {
            for change in &scope.changes {
                let file_change = match change.status {
                    FileStatus::Added => Change::Added,
                    FileStatus::Deleted => Change::Removed,
                    FileStatus::Modified | FileStatus::Renamed => Change::Modified,
                };
                self.push_file(&change.path, file_change, &mut artifacts);

                for line in change.lines() {
                    let (change_kind, number) = match line.kind {
                        LineKind::Added => (Change::Added, line.new_line),
                        LineKind::Removed => (Change::Removed, line.old_line),
                        LineKind::Context => continue,
                    };
                    self.push_line(
                        &change.path,
                        number.unwrap_or(0),
                        &line.text,
                        change_kind,
                        &mut artifacts,
                    );
                }
            }
        } else {
            for file in &scope.files {
                self.push_file(&file.path, Change::Present, &mut artifacts);
                for (i, text) in file.content.lines().enumerate() {
                    self.push_line(&file.path, i + 1, text, Change::Present, &mut artifacts);
                }
            }
        }

        tracing::debug!(
            domain = %self.domain,
            artifacts = artifacts.len(),
            "extracted artifacts"
        );
        Extraction { artifacts, hints }
    }

    fn push_file(&self, path: &str, change: Change, out: &mut Vec<Artifact>) {
        if let Some(kind) = (self.file_kind)(path) {
            out.push(Artifact {
                file: path.to_string(),
                line: 0,
                snippet: String::new(),
                kind,
                change,
            });
        }
    }

    fn push_line(&self, path: &str, line: usize, text: &str, change: Change, out: &mut Vec<Artifact>) {
        for p in &self.patterns {
            if (p.files)(path) && p.re.is_match(text) {
                out.push(Artifact {
                    file: path.to_string(),
                    line,
                    snippet: text.trim().to_string(),
                    kind: p.kind,
                    change,
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// File predicates shared by the domain tables
// ---------------------------------------------------------------------------

fn extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn is_sql(path: &str) -> bool {
    extension(path).eq_ignore_ascii_case("sql")
}

pub fn is_migration(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let in_migration_dir = lower
        .split('/')
        .any(|seg| matches!(seg, "migrations" | "migrate" | "alembic"));
    (in_migration_dir && (is_sql(path) || is_code(path)))
        || (is_sql(path) && lower.contains("migration"))
}

pub fn is_code(path: &str) -> bool {
    matches!(
        extension(path),
        "rs" | "go" | "py" | "rb" | "java" | "kt" | "scala" | "cs" | "ts" | "tsx" | "js" | "jsx"
            | "mjs" | "cjs" | "php" | "swift" | "ex" | "exs" | "vue" | "svelte"
    )
}

pub fn is_frontend(path: &str) -> bool {
    matches!(
        extension(path),
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "vue" | "svelte" | "html" | "htm"
    )
}

pub fn is_markup(path: &str) -> bool {
    matches!(
        extension(path),
        "tsx" | "jsx" | "vue" | "svelte" | "html" | "htm"
    )
}

pub fn is_test(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let name = file_name(&lower).to_string();
    lower.split('/').any(|seg| matches!(seg, "tests" | "test" | "__tests__" | "spec" | "specs"))
        || name.starts_with("test_")
        || name.contains("_test.")
        || name.contains(".test.")
        || name.contains(".spec.")
        || name.contains("_spec.")
}

pub fn is_api_spec(path: &str) -> bool {
    let lower = file_name(path).to_ascii_lowercase();
    let spec_named = (lower.contains("openapi") || lower.contains("swagger"))
        && matches!(extension(path), "yaml" | "yml" | "json");
    spec_named || matches!(extension(path), "proto" | "graphql" | "gql")
}

pub fn is_changelog(path: &str) -> bool {
    let lower = file_name(path).to_ascii_lowercase();
    lower.starts_with("changelog") || lower.starts_with("changes") || lower.starts_with("history")
}

pub fn is_manifest(path: &str) -> bool {
    matches!(
        file_name(path),
        "Cargo.toml" | "package.json" | "pyproject.toml" | "setup.py" | "go.mod" | "pom.xml"
            | "build.gradle" | "build.gradle.kts" | "Gemfile" | "composer.json" | "mix.exs"
    )
}

pub fn code_not_test(path: &str) -> bool {
    is_code(path) && !is_test(path)
}

pub fn any_file(_path: &str) -> bool {
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

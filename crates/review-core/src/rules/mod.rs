//! Built-in checklists, one module per review domain.
//!
//! Each domain module exposes three tables:
//! - `file_kind`: whole-file classification,
//! - `patterns`: line classifiers feeding the extractor,
//! - `rules`: the ordered checklist evaluated over the extracted artifacts.

use crate::checklist::RuleTable;
use crate::context::ContextHints;
use crate::extract::{Artifact, ArtifactKind, LinePattern};
use crate::types::{Confidence, Domain, Finding, Severity};

// ---------------------------------------------------------------------------
// Helper macros for concise rule definitions
// ---------------------------------------------------------------------------

macro_rules! rule {
    (
        id: $id:expr,
        category: $cat:expr,
        kinds: $kinds:expr,
        severity: $sev:expr,
        confidence: $conf:expr,
        title: $title:expr
        $(, changes: $changes:expr)?
        $(, condition: $cond:expr)?
        $(, remediation: $rem:expr)?
    ) => {
        $crate::checklist::Check::Artifact($crate::checklist::Rule {
            id: $id,
            category: $cat,
            kinds: $kinds,
            changes: {
                #[allow(unused_assignments, unused_mut)]
                let mut v: &'static [$crate::extract::Change] = &[];
                $(v = $changes;)?
                v
            },
            condition: {
                #[allow(unused_assignments, unused_mut)]
                let mut v: fn(&$crate::extract::Artifact, &$crate::context::ContextHints) -> bool =
                    $crate::rules::always;
                $(v = $cond;)?
                v
            },
            severity: $sev,
            confidence: $conf,
            title: $title,
            remediation: {
                #[allow(unused_assignments, unused_mut)]
                let mut v: Option<&'static str> = None;
                $(v = Some($rem);)?
                v
            },
        })
    };
}

macro_rules! set_rule {
    (
        id: $id:expr,
        category: $cat:expr,
        title: $title:expr,
        evaluate: $eval:expr
    ) => {
        $crate::checklist::Check::Set($crate::checklist::SetRule {
            id: $id,
            category: $cat,
            title: $title,
            evaluate: $eval,
        })
    };
}

mod api_contracts;
mod frontend_performance;
mod migrations;
mod release;
mod reliability;
mod testing;

pub type FileClassifier = fn(&str) -> Option<ArtifactKind>;

/// The extractor inputs for one domain.
pub fn extraction_table(domain: Domain) -> (FileClassifier, Vec<LinePattern>) {
    match domain {
        Domain::ApiContracts => (api_contracts::file_kind, api_contracts::patterns()),
        Domain::FrontendPerformance => (
            frontend_performance::file_kind,
            frontend_performance::patterns(),
        ),
        Domain::Migrations => (migrations::file_kind, migrations::patterns()),
        Domain::Release => (release::file_kind, release::patterns()),
        Domain::Reliability => (reliability::file_kind, reliability::patterns()),
        Domain::Testing => (testing::file_kind, testing::patterns()),
    }
}

/// The built-in checklist for one domain, in priority order.
pub fn table(domain: Domain) -> RuleTable {
    let checks = match domain {
        Domain::ApiContracts => api_contracts::rules(),
        Domain::FrontendPerformance => frontend_performance::rules(),
        Domain::Migrations => migrations::rules(),
        Domain::Release => release::rules(),
        Domain::Reliability => reliability::rules(),
        Domain::Testing => testing::rules(),
    };
    RuleTable { domain, checks }
}

// ---------------------------------------------------------------------------
// Condition helpers
// ---------------------------------------------------------------------------

pub(crate) fn always(_: &Artifact, _: &ContextHints) -> bool {
    true
}

/// Case-insensitive substring test on the artifact's snippet.
fn has(a: &Artifact, needle: &str) -> bool {
    a.snippet.to_ascii_lowercase().contains(needle)
}

/// Whether any artifact reflects an actual change rather than a snapshot of
/// the tree. Rules about "what the change forgot" only make sense then.
fn is_change_set(artifacts: &[Artifact]) -> bool {
    artifacts
        .iter()
        .any(|a| a.change != crate::extract::Change::Present)
}

fn first_of<'a>(
    artifacts: &'a [Artifact],
    pred: impl Fn(&Artifact) -> bool,
) -> Option<&'a Artifact> {
    artifacts.iter().find(|a| pred(a))
}

/// A finding anchored at `artifact` with an explicit evidence line.
#[allow(clippy::too_many_arguments)]
fn set_finding(
    rule: &str,
    category: &str,
    title: &str,
    severity: Severity,
    confidence: Confidence,
    artifact: &Artifact,
    evidence: String,
    remediation: &str,
) -> Finding {
    let mut f = crate::checklist::finding_at(
        rule,
        category,
        title,
        severity,
        confidence,
        artifact,
        Some(remediation),
    );
    f.evidence = evidence;
    f
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

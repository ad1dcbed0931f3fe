//! Checklist evaluation.
//!
//! A domain's checklist is an ordered table of checks. Every check is applied
//! to every applicable artifact exactly once; a match never short-circuits
//! later checks. Table order only matters as the tie-breaker between findings
//! of equal severity and confidence.

use crate::context::ContextHints;
use crate::extract::{Artifact, ArtifactKind, Change};
use crate::types::{Confidence, Domain, Finding, Location, Severity};
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Predicate (extension point)
// ---------------------------------------------------------------------------

/// A single-artifact check. Built-in pattern rules implement this; so can an
/// external reasoning engine for the judgments a pattern cannot make.
pub trait Predicate {
    fn id(&self) -> &str;

    fn applies_to(&self, _artifact: &Artifact) -> bool {
        true
    }

    fn evaluate(&self, artifact: &Artifact, hints: &ContextHints) -> Option<Finding>;
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A fn-pointer pattern rule over one artifact.
pub struct Rule {
    pub id: &'static str,
    pub category: &'static str,
    pub kinds: &'static [ArtifactKind],
    /// Which change directions the rule looks at; empty means any.
    pub changes: &'static [Change],
    pub condition: fn(&Artifact, &ContextHints) -> bool,
    pub severity: fn(&Artifact, &ContextHints) -> Severity,
    pub confidence: Confidence,
    pub title: &'static str,
    pub remediation: Option<&'static str>,
}

impl Predicate for Rule {
    fn id(&self) -> &str {
        self.id
    }

    fn applies_to(&self, artifact: &Artifact) -> bool {
        self.kinds.contains(&artifact.kind)
            && (self.changes.is_empty() || self.changes.contains(&artifact.change))
    }

    fn evaluate(&self, artifact: &Artifact, hints: &ContextHints) -> Option<Finding> {
        if !(self.condition)(artifact, hints) {
            return None;
        }
        Some(finding_at(
            self.id,
            self.category,
            self.title,
            (self.severity)(artifact, hints),
            self.confidence,
            artifact,
            self.remediation,
        ))
    }
}

// ---------------------------------------------------------------------------
// SetRule
// ---------------------------------------------------------------------------

/// A check over the whole artifact list, for conditions that relate
/// artifacts to each other ("field removed and no version bump anywhere").
pub struct SetRule {
    pub id: &'static str,
    pub category: &'static str,
    pub title: &'static str,
    pub evaluate: fn(&[Artifact], &ContextHints) -> Vec<Finding>,
}

// ---------------------------------------------------------------------------
// RuleTable
// ---------------------------------------------------------------------------

pub enum Check {
    Artifact(Rule),
    Set(SetRule),
}

impl Check {
    pub fn id(&self) -> &str {
        match self {
            Check::Artifact(r) => r.id,
            Check::Set(r) => r.id,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            Check::Artifact(r) => r.category,
            Check::Set(r) => r.category,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Check::Artifact(r) => r.title,
            Check::Set(r) => r.title,
        }
    }

    /// `artifact` for single-artifact rules, `set` for whole-scope rules.
    pub fn shape(&self) -> &'static str {
        match self {
            Check::Artifact(_) => "artifact",
            Check::Set(_) => "set",
        }
    }
}

/// One domain's checklist in priority order.
pub struct RuleTable {
    pub domain: Domain,
    pub checks: Vec<Check>,
}

impl RuleTable {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.id())
    }
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Findings in table order, then file, then line.
    pub findings: Vec<Finding>,
    /// Number of checks that ran (built-in and injected).
    pub rules_evaluated: usize,
}

pub struct Checklist {
    table: RuleTable,
    disabled: HashSet<String>,
    overrides: HashMap<String, Severity>,
    external: Vec<Box<dyn Predicate>>,
}

impl Checklist {
    pub fn new(table: RuleTable) -> Self {
        Self {
            table,
            disabled: HashSet::new(),
            overrides: HashMap::new(),
            external: Vec::new(),
        }
    }

    pub fn for_domain(domain: Domain) -> Self {
        Self::new(crate::rules::table(domain))
    }

    pub fn domain(&self) -> Domain {
        self.table.domain
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn disable<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, Severity>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    /// Register an injected predicate. Injected predicates run after the
    /// built-in table, in registration order.
    pub fn with_predicate(mut self, predicate: Box<dyn Predicate>) -> Self {
        self.external.push(predicate);
        self
    }

    pub fn evaluate(&self, artifacts: &[Artifact], hints: &ContextHints) -> Evaluation {
        let mut findings = Vec::new();
        let mut rules_evaluated = 0;

        for check in &self.table.checks {
            if self.disabled.contains(check.id()) {
                tracing::debug!(rule = check.id(), "rule disabled by config");
                continue;
            }
            rules_evaluated += 1;
            let mut batch = match check {
                Check::Artifact(rule) => run_predicate(rule, artifacts, hints),
                Check::Set(rule) => (rule.evaluate)(artifacts, hints),
            };
            sort_by_location(&mut batch);
            findings.extend(batch);
        }

        for predicate in &self.external {
            if self.disabled.contains(predicate.id()) {
                continue;
            }
            rules_evaluated += 1;
            let mut batch = run_predicate(predicate.as_ref(), artifacts, hints);
            sort_by_location(&mut batch);
            findings.extend(batch);
        }

        for finding in &mut findings {
            if let Some(severity) = self.overrides.get(&finding.rule) {
                finding.severity = *severity;
            }
        }

        tracing::debug!(
            domain = %self.table.domain,
            rules_evaluated,
            findings = findings.len(),
            "evaluated checklist"
        );
        Evaluation {
            findings,
            rules_evaluated,
        }
    }
}

fn run_predicate(
    predicate: &dyn Predicate,
    artifacts: &[Artifact],
    hints: &ContextHints,
) -> Vec<Finding> {
    artifacts
        .iter()
        .filter(|a| predicate.applies_to(a))
        .filter_map(|a| predicate.evaluate(a, hints))
        .collect()
}

fn sort_by_location(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.location
            .file
            .cmp(&b.location.file)
            .then(a.location.line.cmp(&b.location.line))
    });
}

/// Build a finding anchored at `artifact`.
pub fn finding_at(
    rule: &str,
    category: &str,
    title: &str,
    severity: Severity,
    confidence: Confidence,
    artifact: &Artifact,
    remediation: Option<&str>,
) -> Finding {
    let evidence = if artifact.snippet.is_empty() {
        format!("{} ({})", artifact.file, artifact.kind)
    } else {
        artifact.snippet.clone()
    };
    Finding {
        id: String::new(),
        rule: rule.to_string(),
        title: title.to_string(),
        severity,
        confidence,
        category: category.to_string(),
        location: Location {
            file: artifact.file.clone(),
            line: artifact.line,
        },
        evidence,
        remediation: remediation.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(kind: ArtifactKind, file: &str, line: usize, snippet: &str) -> Artifact {
        Artifact {
            file: file.into(),
            line,
            snippet: snippet.into(),
            kind,
            change: Change::Added,
        }
    }

    fn todo_rule(id: &'static str, severity: Severity) -> Rule {
        Rule {
            id,
            category: "hygiene",
            kinds: &[ArtifactKind::TodoMarker],
            changes: &[],
            condition: |_, _| true,
            severity: match severity {
                Severity::High => |_, _| Severity::High,
                _ => |_, _| Severity::Low,
            },
            confidence: Confidence::High,
            title: "todo",
            remediation: None,
        }
    }

    struct AlwaysFlag;

    impl Predicate for AlwaysFlag {
        fn id(&self) -> &str {
            "external-judgment"
        }

        fn evaluate(&self, artifact: &Artifact, _hints: &ContextHints) -> Option<Finding> {
            Some(finding_at(
                self.id(),
                "judgment",
                "Reasoning engine flagged this",
                Severity::Med,
                Confidence::Low,
                artifact,
                None,
            ))
        }
    }

    fn table(checks: Vec<Check>) -> RuleTable {
        RuleTable {
            domain: Domain::Release,
            checks,
        }
    }

    #[test]
    fn every_rule_sees_every_artifact() {
        let checklist = Checklist::new(table(vec![
            Check::Artifact(todo_rule("first", Severity::High)),
            Check::Artifact(todo_rule("second", Severity::Low)),
        ]));
        let artifacts = vec![
            artifact(ArtifactKind::TodoMarker, "b.rs", 2, "// TODO b"),
            artifact(ArtifactKind::TodoMarker, "a.rs", 9, "// TODO a"),
            artifact(ArtifactKind::DebugArtifact, "a.rs", 1, "dbg!(x)"),
        ];
        let eval = checklist.evaluate(&artifacts, &ContextHints::default());
        assert_eq!(eval.rules_evaluated, 2);
        let got: Vec<_> = eval
            .findings
            .iter()
            .map(|f| (f.rule.as_str(), f.location.file.as_str()))
            .collect();
        assert_eq!(
            got,
            [("first", "a.rs"), ("first", "b.rs"), ("second", "a.rs"), ("second", "b.rs")]
        );
    }

    #[test]
    fn change_filter_limits_rule() {
        let mut rule = todo_rule("removed-only", Severity::Low);
        rule.changes = &[Change::Removed];
        let checklist = Checklist::new(table(vec![Check::Artifact(rule)]));
        let eval = checklist.evaluate(
            &[artifact(ArtifactKind::TodoMarker, "a.rs", 1, "TODO")],
            &ContextHints::default(),
        );
        assert!(eval.findings.is_empty());
    }

    #[test]
    fn disabled_rules_and_overrides() {
        let checklist = Checklist::new(table(vec![
            Check::Artifact(todo_rule("keep", Severity::Low)),
            Check::Artifact(todo_rule("drop", Severity::Low)),
        ]))
        .disable(["drop"])
        .with_overrides(HashMap::from([("keep".to_string(), Severity::Blocker)]));
        let eval = checklist.evaluate(
            &[artifact(ArtifactKind::TodoMarker, "a.rs", 1, "TODO")],
            &ContextHints::default(),
        );
        assert_eq!(eval.rules_evaluated, 1);
        assert_eq!(eval.findings.len(), 1);
        assert_eq!(eval.findings[0].severity, Severity::Blocker);
    }

    #[test]
    fn set_rules_see_all_artifacts() {
        let set = SetRule {
            id: "count",
            category: "hygiene",
            title: "many",
            evaluate: |artifacts, _| {
                if artifacts.len() > 1 {
                    vec![finding_at(
                        "count",
                        "hygiene",
                        "many",
                        Severity::Nit,
                        Confidence::Med,
                        &artifacts[0],
                        None,
                    )]
                } else {
                    Vec::new()
                }
            },
        };
        let checklist = Checklist::new(table(vec![Check::Set(set)]));
        let artifacts = vec![
            artifact(ArtifactKind::TodoMarker, "a.rs", 1, "TODO"),
            artifact(ArtifactKind::TodoMarker, "a.rs", 2, "TODO"),
        ];
        let eval = checklist.evaluate(&artifacts, &ContextHints::default());
        assert_eq!(eval.findings.len(), 1);
    }

    #[test]
    fn injected_predicates_run_after_table() {
        let checklist = Checklist::new(table(vec![Check::Artifact(todo_rule(
            "builtin",
            Severity::Low,
        ))]))
        .with_predicate(Box::new(AlwaysFlag));
        let eval = checklist.evaluate(
            &[artifact(ArtifactKind::TodoMarker, "a.rs", 1, "TODO")],
            &ContextHints::default(),
        );
        assert_eq!(eval.rules_evaluated, 2);
        assert_eq!(eval.findings[0].rule, "builtin");
        assert_eq!(eval.findings[1].rule, "external-judgment");
        assert_eq!(eval.findings[1].evidence, "TODO");
    }

    #[test]
    fn file_level_evidence_names_file() {
        let a = artifact(ArtifactKind::TestFile, "tests/a.rs", 0, "");
        let f = finding_at("r", "c", "t", Severity::Low, Confidence::Low, &a, Some("fix"));
        assert_eq!(f.evidence, "tests/a.rs (test_file)");
        assert_eq!(f.remediation.as_deref(), Some("fix"));
    }
}

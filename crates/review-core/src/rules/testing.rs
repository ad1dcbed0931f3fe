use super::{first_of, is_change_set, set_finding};
use crate::checklist::Check;
use crate::context::ContextHints;
use crate::extract::{code_not_test, is_code, is_test, Artifact, ArtifactKind, Change, LinePattern};
use crate::types::{Confidence, Finding, Severity};
use std::collections::BTreeSet;

const CATEGORY_COVERAGE: &str = "coverage";
const CATEGORY_HYGIENE: &str = "hygiene";
const CATEGORY_FLAKINESS: &str = "flakiness";

const EXISTS_AFTER: &[Change] = &[Change::Added, Change::Present];

pub(super) fn file_kind(path: &str) -> Option<ArtifactKind> {
    if is_test(path) && is_code(path) {
        Some(ArtifactKind::TestFile)
    } else if code_not_test(path) {
        Some(ArtifactKind::SourceFile)
    } else {
        None
    }
}

fn test_code(path: &str) -> bool {
    is_test(path) && is_code(path)
}

/// Rust keeps unit tests next to the code, so `#[cfg(test)]` modules count too.
fn any_test_code(path: &str) -> bool {
    is_code(path)
}

pub(super) fn patterns() -> Vec<LinePattern> {
    vec![
        LinePattern {
            kind: ArtifactKind::TestBlock,
            files: any_test_code,
            pattern: r#"^\s*(#\[(tokio::)?test\]|(it|test|describe)\s*\(\s*['"`]|def\s+test_\w+|func\s+Test\w+\s*\(|@Test\b)"#,
        },
        LinePattern {
            kind: ArtifactKind::Assertion,
            files: test_code,
            pattern: r#"\bassert(_eq|_ne|_matches)?!\(|\bassert\w*\s*\(|\bexpect\(.*\)\.\w+|\.should\b|\bself\.assert\w+\(|\brequire\.\w+\(|\bt\.(Error|Fatal)f?\("#,
        },
        LinePattern {
            kind: ArtifactKind::SkippedTest,
            files: test_code,
            pattern: r#"#\[ignore\b|\b(it|describe|test)\.skip\s*\(|\bx(it|describe)\s*\(|@pytest\.mark\.skip|@unittest\.skip|@Disabled\b|@Ignore\b|\bt\.Skip(Now)?\("#,
        },
        LinePattern {
            kind: ArtifactKind::FocusedTest,
            files: test_code,
            pattern: r#"\b(it|describe|test)\.only\s*\(|\bf(it|describe)\s*\("#,
        },
        LinePattern {
            kind: ArtifactKind::SleepInTest,
            files: test_code,
            pattern: r#"\bthread::sleep\(|\btokio::time::sleep\(|\btime\.[Ss]leep\(|\bsetTimeout\(|\bThread\.sleep\(|\bawait\s+sleep\("#,
        },
        LinePattern {
            kind: ArtifactKind::Snapshot,
            files: test_code,
            pattern: r#"\btoMatch(Inline)?Snapshot\(|\bassert_(yaml_|json_|debug_)?snapshot!\(|\bsnapshot\.assert_match\("#,
        },
    ]
}

// ---------------------------------------------------------------------------
// Set rules
// ---------------------------------------------------------------------------

fn source_changed(a: &Artifact) -> bool {
    a.kind == ArtifactKind::SourceFile && matches!(a.change, Change::Added | Change::Modified)
}

/// Production code changed and no test code changed anywhere in the scope.
fn source_without_tests(artifacts: &[Artifact], hints: &ContextHints) -> Vec<Finding> {
    if !is_change_set(artifacts) {
        return Vec::new();
    }
    let tests_touched = artifacts
        .iter()
        .any(|a| a.kind == ArtifactKind::TestFile || a.kind == ArtifactKind::TestBlock);
    if tests_touched {
        return Vec::new();
    }
    let Some(anchor) = first_of(artifacts, source_changed) else {
        return Vec::new();
    };
    let files: Vec<&str> = artifacts
        .iter()
        .filter(|a| source_changed(a))
        .map(|a| a.file.as_str())
        .collect();
    let severity = if hints.hotfix { Severity::Med } else { Severity::High };
    vec![set_finding(
        "source-without-tests",
        CATEGORY_COVERAGE,
        "Source changed without test changes",
        severity,
        Confidence::Med,
        anchor,
        format!("changed without tests: {}", files.join(", ")),
        "Add or update tests that exercise the changed behavior.",
    )]
}

/// Test files that declare tests but contain no assertion at all.
fn tests_without_assertions(artifacts: &[Artifact], _hints: &ContextHints) -> Vec<Finding> {
    let asserting: BTreeSet<&str> = artifacts
        .iter()
        .filter(|a| matches!(a.kind, ArtifactKind::Assertion | ArtifactKind::Snapshot))
        .filter(|a| a.exists_after())
        .map(|a| a.file.as_str())
        .collect();
    let mut seen = BTreeSet::new();
    artifacts
        .iter()
        .filter(|a| {
            a.kind == ArtifactKind::TestBlock
                && a.exists_after()
                && is_test(&a.file)
                && !asserting.contains(a.file.as_str())
                && seen.insert(a.file.clone())
        })
        .map(|a| {
            set_finding(
                "test-without-assertion",
                CATEGORY_COVERAGE,
                "Test without assertions",
                Severity::Med,
                Confidence::Low,
                a,
                a.snippet.clone(),
                "Assert on the behavior under test; a test that cannot fail proves nothing.",
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
            id: "focused-test",
            category: CATEGORY_HYGIENE,
            kinds: &[ArtifactKind::FocusedTest],
            severity: |_, _| Severity::Blocker,
            confidence: Confidence::High,
            title: "Focused test silently skips the rest of the suite",
            changes: EXISTS_AFTER,
            remediation: "Remove `.only` / `fit` before merging."
        },
        set_rule! {
            id: "source-without-tests",
            category: CATEGORY_COVERAGE,
            title: "Source changed without test changes",
            evaluate: source_without_tests
        },
        rule! {
            id: "skipped-test",
            category: CATEGORY_HYGIENE,
            kinds: &[ArtifactKind::SkippedTest],
            severity: |_, _| Severity::Med,
            confidence: Confidence::High,
            title: "Skipped test",
            changes: EXISTS_AFTER,
            remediation: "Fix or delete the test; if it must stay skipped, link the tracking issue."
        },
        rule! {
            id: "assertion-removed",
            category: CATEGORY_COVERAGE,
            kinds: &[ArtifactKind::Assertion],
            severity: |_, _| Severity::Med,
            confidence: Confidence::Low,
            title: "Assertion removed",
            changes: &[Change::Removed],
            remediation: "Confirm the removed check is covered elsewhere."
        },
        set_rule! {
            id: "test-without-assertion",
            category: CATEGORY_COVERAGE,
            title: "Test without assertions",
            evaluate: tests_without_assertions
        },
        rule! {
            id: "sleep-in-test",
            category: CATEGORY_FLAKINESS,
            kinds: &[ArtifactKind::SleepInTest],
            severity: |_, _| Severity::Low,
            confidence: Confidence::Med,
            title: "Fixed sleep in test",
            changes: EXISTS_AFTER,
            remediation: "Wait on the condition (poll with timeout) or use a controllable clock."
        },
        rule! {
            id: "snapshot-added",
            category: CATEGORY_HYGIENE,
            kinds: &[ArtifactKind::Snapshot],
            severity: |_, _| Severity::Nit,
            confidence: Confidence::Low,
            title: "Snapshot assertion added",
            changes: &[Change::Added],
            remediation: "Review the stored snapshot; prefer targeted assertions for key fields."
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::super::tests::{by_rule, review_diff, review_files, rule_ids};
    use crate::types::{Domain, Severity};

    #[test]
    fn focused_test_blocks() {
        let spec = "describe('cart', () => {\n  it.only('adds', () => {\n    expect(add(1)).toBe(1);\n  });\n});\n";
        let findings = review_files(Domain::Testing, &[("web/cart.test.ts", spec)], None);
        let f = by_rule(&findings, "focused-test");
        assert_eq!(f.severity, Severity::Blocker);
        assert_eq!(f.location.line, 2);
        assert!(!rule_ids(&findings).contains(&"test-without-assertion"));
    }

    #[test]
    fn source_change_without_tests() {
        let raw = "\
diff --git a/src/auth.rs b/src/auth.rs
--- a/src/auth.rs
+++ b/src/auth.rs
@@ -1,1 +1,2 @@
 pub fn login() {}
+pub fn logout() {}
";
        let findings = review_diff(Domain::Testing, raw, None);
        let f = by_rule(&findings, "source-without-tests");
        assert_eq!(f.severity, Severity::High);
        assert!(f.evidence.contains("src/auth.rs"));
    }

    #[test]
    fn touching_tests_satisfies_coverage() {
        let raw = "\
diff --git a/src/auth.rs b/src/auth.rs
--- a/src/auth.rs
+++ b/src/auth.rs
@@ -1,1 +1,2 @@
 pub fn login() {}
+pub fn logout() {}
diff --git a/tests/auth_test.rs b/tests/auth_test.rs
--- a/tests/auth_test.rs
+++ b/tests/auth_test.rs
@@ -1,1 +1,2 @@
 use app::*;
+fn helper() {}
";
        let findings = review_diff(Domain::Testing, raw, None);
        assert!(!rule_ids(&findings).contains(&"source-without-tests"));
    }

    #[test]
    fn hollow_and_sleepy_tests() {
        let py = "import time\n\ndef test_sync():\n    time.sleep(2)\n    sync()\n";
        let findings = review_files(Domain::Testing, &[("tests/test_sync.py", py)], None);
        assert_eq!(by_rule(&findings, "test-without-assertion").location.line, 3);
        assert_eq!(by_rule(&findings, "sleep-in-test").location.line, 4);
    }

    #[test]
    fn removed_assertion() {
        let raw = "\
diff --git a/tests/login_test.rs b/tests/login_test.rs
--- a/tests/login_test.rs
+++ b/tests/login_test.rs
@@ -4,2 +4,1 @@
     let user = login();
-    assert_eq!(user.name, \"ada\");
";
        let findings = review_diff(Domain::Testing, raw, None);
        assert_eq!(by_rule(&findings, "assertion-removed").location.line, 5);
    }
}

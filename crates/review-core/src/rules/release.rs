use super::{first_of, is_change_set, set_finding};
use crate::checklist::Check;
use crate::context::ContextHints;
use crate::extract::{
    code_not_test, is_changelog, is_code, is_manifest, is_test, Artifact, ArtifactKind, Change,
    LinePattern,
};
use crate::types::{Confidence, Finding, Severity};

const CATEGORY_HYGIENE: &str = "hygiene";
const CATEGORY_VERSIONING: &str = "versioning";
const CATEGORY_DEPENDENCIES: &str = "dependencies";
const CATEGORY_ROLLOUT: &str = "rollout";

/// Manifest keys that are not dependencies.
const MANIFEST_META: &[&str] = &[
    "version", "name", "edition", "description", "license", "authors", "repository", "homepage",
    "readme", "main", "module", "types", "private", "rust-version", "resolver", "publish",
];

pub(super) fn file_kind(path: &str) -> Option<ArtifactKind> {
    if is_changelog(path) {
        Some(ArtifactKind::Changelog)
    } else if is_manifest(path) {
        Some(ArtifactKind::Manifest)
    } else if is_test(path) && is_code(path) {
        Some(ArtifactKind::TestFile)
    } else if code_not_test(path) {
        Some(ArtifactKind::SourceFile)
    } else {
        None
    }
}

fn any_code(path: &str) -> bool {
    is_code(path)
}

pub(super) fn patterns() -> Vec<LinePattern> {
    vec![
        LinePattern {
            kind: ArtifactKind::VersionField,
            files: is_manifest,
            pattern: r#"^\s*"?version"?\s*[:=]\s*["']?\d+\.\d+"#,
        },
        LinePattern {
            kind: ArtifactKind::ChangelogEntry,
            files: is_changelog,
            pattern: r#"^\s*(##?#?\s*\[?v?\d+\.\d+|[-*]\s+\S)"#,
        },
        LinePattern {
            kind: ArtifactKind::DependencyChange,
            files: is_manifest,
            pattern: r#"^\s*"?[\w@/.-]+"?\s*[:=]\s*(\{.*\bversion\b|"[\^~>=<*]?\d|'[\^~>=<*]?\d)"#,
        },
        LinePattern {
            kind: ArtifactKind::FeatureFlag,
            files: code_not_test,
            pattern: r#"(?i)feature[_-]?flag|featureflag|is_?feature_?enabled|launchdarkly|\bunleash\b|\bflipper\b"#,
        },
        LinePattern {
            kind: ArtifactKind::TodoMarker,
            files: any_code,
            pattern: r#"\b(TODO|FIXME|XXX|HACK)\b"#,
        },
        LinePattern {
            kind: ArtifactKind::DebugArtifact,
            files: code_not_test,
            pattern: r#"\bconsole\.(log|debug)\(|\bdebugger;|\bdbg!\(|\bbinding\.pry\b|\bbyebug\b|\bpdb\.set_trace\(|\bbreakpoint\(\)|\bvar_dump\("#,
        },
    ]
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

fn dependency_key(a: &Artifact) -> String {
    a.snippet
        .split([':', '='])
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .to_ascii_lowercase()
}

fn is_dependency(a: &Artifact, _: &ContextHints) -> bool {
    let key = dependency_key(a);
    !key.is_empty() && !MANIFEST_META.contains(&key.as_str())
}

fn source_changed(a: &Artifact) -> bool {
    a.kind == ArtifactKind::SourceFile && matches!(a.change, Change::Added | Change::Modified)
}

// ---------------------------------------------------------------------------
// Set rules
// ---------------------------------------------------------------------------

fn missing_changelog(artifacts: &[Artifact], hints: &ContextHints) -> Vec<Finding> {
    if !is_change_set(artifacts) {
        return Vec::new();
    }
    let Some(anchor) = first_of(artifacts, source_changed) else {
        return Vec::new();
    };
    if artifacts.iter().any(|a| a.kind == ArtifactKind::Changelog) {
        return Vec::new();
    }
    let changed = artifacts.iter().filter(|a| source_changed(a)).count();
    let severity = if hints.hotfix { Severity::Low } else { Severity::Med };
    vec![set_finding(
        "missing-changelog",
        CATEGORY_VERSIONING,
        "Code changed without a changelog entry",
        severity,
        Confidence::Med,
        anchor,
        format!("{changed} source file(s) changed and no changelog touched"),
        "Add a changelog entry describing the user-visible change.",
    )]
}

fn version_not_bumped(artifacts: &[Artifact], _hints: &ContextHints) -> Vec<Finding> {
    if !is_change_set(artifacts) {
        return Vec::new();
    }
    let Some(anchor) = first_of(artifacts, |a| {
        a.kind == ArtifactKind::ChangelogEntry && a.change == Change::Added
    }) else {
        return Vec::new();
    };
    let bumped = artifacts
        .iter()
        .any(|a| a.kind == ArtifactKind::VersionField && a.change == Change::Added);
    if bumped {
        return Vec::new();
    }
    vec![set_finding(
        "version-not-bumped",
        CATEGORY_VERSIONING,
        "Changelog updated but no manifest version bump",
        Severity::Med,
        Confidence::Low,
        anchor,
        anchor.snippet.clone(),
        "Bump the package version to match the changelog section being released.",
    )]
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

pub(super) fn rules() -> Vec<Check> {
    vec![
        rule! {
            id: "debug-artifact",
            category: CATEGORY_HYGIENE,
            kinds: &[ArtifactKind::DebugArtifact],
            severity: |_, _| Severity::High,
            confidence: Confidence::High,
            title: "Debug statement left in release code",
            changes: &[Change::Added, Change::Present],
            remediation: "Remove the debug statement or route it through the logger."
        },
        set_rule! {
            id: "missing-changelog",
            category: CATEGORY_VERSIONING,
            title: "Code changed without a changelog entry",
            evaluate: missing_changelog
        },
        set_rule! {
            id: "version-not-bumped",
            category: CATEGORY_VERSIONING,
            title: "Changelog updated but no manifest version bump",
            evaluate: version_not_bumped
        },
        rule! {
            id: "feature-flag-removed",
            category: CATEGORY_ROLLOUT,
            kinds: &[ArtifactKind::FeatureFlag],
            severity: |_, _| Severity::Med,
            confidence: Confidence::Low,
            title: "Feature flag check removed",
            changes: &[Change::Removed],
            remediation: "Confirm the flag is fully rolled out everywhere before deleting the guard."
        },
        rule! {
            id: "dependency-changed",
            category: CATEGORY_DEPENDENCIES,
            kinds: &[ArtifactKind::DependencyChange],
            severity: |_, h| if h.hotfix { Severity::Med } else { Severity::Low },
            confidence: Confidence::Med,
            title: "Dependency added or upgraded",
            changes: &[Change::Added],
            condition: is_dependency,
            remediation: "Check the dependency's changelog and license, and that the lockfile is updated."
        },
        rule! {
            id: "todo-added",
            category: CATEGORY_HYGIENE,
            kinds: &[ArtifactKind::TodoMarker],
            severity: |_, _| Severity::Low,
            confidence: Confidence::High,
            title: "New TODO in release",
            changes: &[Change::Added],
            remediation: "Resolve it or link a tracking issue."
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::super::tests::{by_rule, review_diff, review_files, rule_ids};
    use crate::types::{Domain, Severity};

    const CODE_ONLY: &str = "\
diff --git a/src/billing.rs b/src/billing.rs
--- a/src/billing.rs
+++ b/src/billing.rs
@@ -1,1 +1,3 @@
 fn charge() {
+    dbg!(amount);
+    // TODO: retry on decline
";

    #[test]
    fn code_change_without_changelog() {
        let findings = review_diff(Domain::Release, CODE_ONLY, None);
        assert_eq!(by_rule(&findings, "debug-artifact").location.line, 2);
        assert_eq!(by_rule(&findings, "todo-added").location.line, 3);
        assert_eq!(by_rule(&findings, "missing-changelog").severity, Severity::Med);
    }

    #[test]
    fn hotfix_relaxes_changelog() {
        let findings = review_diff(Domain::Release, CODE_ONLY, Some("hotfix for prod outage"));
        assert_eq!(by_rule(&findings, "missing-changelog").severity, Severity::Low);
    }

    #[test]
    fn changelog_without_version_bump() {
        let raw = "\
diff --git a/CHANGELOG.md b/CHANGELOG.md
--- a/CHANGELOG.md
+++ b/CHANGELOG.md
@@ -1,1 +1,3 @@
 # Changelog
+## 1.3.0
+- Faster invoices
diff --git a/Cargo.toml b/Cargo.toml
--- a/Cargo.toml
+++ b/Cargo.toml
@@ -3,1 +3,2 @@
 edition = \"2021\"
+serde = \"1.0\"
";
        let findings = review_diff(Domain::Release, raw, None);
        let ids = rule_ids(&findings);
        assert!(ids.contains(&"version-not-bumped"));
        assert!(ids.contains(&"dependency-changed"));
        assert!(!ids.contains(&"missing-changelog"));
    }

    #[test]
    fn version_line_is_not_a_dependency() {
        let raw = "\
diff --git a/Cargo.toml b/Cargo.toml
--- a/Cargo.toml
+++ b/Cargo.toml
@@ -2,1 +2,1 @@
-version = \"1.2.0\"
+version = \"1.3.0\"
";
        let findings = review_diff(Domain::Release, raw, None);
        assert!(!rule_ids(&findings).contains(&"dependency-changed"));
    }

    #[test]
    fn tree_scope_skips_change_rules() {
        let findings = review_files(
            Domain::Release,
            &[("src/main.rs", "fn main() {\n    // TODO later\n}\n")],
            None,
        );
        assert!(findings.is_empty());
    }
}

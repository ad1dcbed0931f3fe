use super::{first_of, has, is_change_set, set_finding};
use crate::checklist::Check;
use crate::context::ContextHints;
use crate::extract::{
    any_file, code_not_test, is_api_spec, is_changelog, Artifact, ArtifactKind, Change, LinePattern,
};
use crate::types::{Confidence, Finding, Severity};

const CATEGORY_COMPAT: &str = "compatibility";
const CATEGORY_VERSIONING: &str = "versioning";
const CATEGORY_DOCS: &str = "documentation";

/// OpenAPI structural keys that look like field names but are not.
const SPEC_KEYWORDS: &[&str] = &[
    "paths", "components", "schemas", "properties", "items", "responses", "parameters",
    "requestbody", "content", "application/json", "schema", "get", "post", "put", "patch",
    "delete", "head", "options", "info", "servers", "tags", "security", "allof", "oneof",
    "anyof", "examples", "headers", "securityschemes", "additionalproperties",
];

pub(super) fn file_kind(path: &str) -> Option<ArtifactKind> {
    if is_api_spec(path) {
        Some(ArtifactKind::ApiSpecFile)
    } else if is_changelog(path) {
        Some(ArtifactKind::Changelog)
    } else if code_not_test(path) {
        Some(ArtifactKind::SourceFile)
    } else {
        None
    }
}

fn code_or_spec(path: &str) -> bool {
    is_api_spec(path) || code_not_test(path)
}

pub(super) fn patterns() -> Vec<LinePattern> {
    vec![
        LinePattern {
            kind: ArtifactKind::Endpoint,
            files: code_not_test,
            pattern: r#"(?i)(@(get|post|put|patch|delete|request)mapping\b|@(app|router|bp|api)\.(get|post|put|patch|delete|route)\(|\b(router|app|server)\.(get|post|put|patch|delete)\(\s*['"`]/|\.route\(\s*"/|#\[(get|post|put|patch|delete)\(\s*"/|\bhandlefunc\(\s*"/)"#,
        },
        LinePattern {
            kind: ArtifactKind::Endpoint,
            files: is_api_spec,
            pattern: r#"^\s{0,4}/[\w{}/.-]*:\s*$|^\s*rpc\s+\w+\s*\("#,
        },
        LinePattern {
            kind: ArtifactKind::SchemaField,
            files: is_api_spec,
            pattern: r#"^\s{4,}[A-Za-z_][\w]*:\s*(\{.*\}\s*)?$|^\s*(optional\s+|repeated\s+)?[\w.]+\s+\w+\s*=\s*\d+\s*;|^\s+\w+\s*(\([^)]*\))?\s*:\s*\[?\w+!?\]?!?\s*$"#,
        },
        LinePattern {
            kind: ArtifactKind::RequiredField,
            files: is_api_spec,
            pattern: r#"^\s*required:\s*(\[.*\]|true)?\s*$|^\s*required\s+[\w.]+\s+\w+\s*=\s*\d+|^\s+\w+\s*(\([^)]*\))?\s*:\s*\[?\w+\]?!\s*$"#,
        },
        LinePattern {
            kind: ArtifactKind::StatusCode,
            files: code_or_spec,
            pattern: r#"(?i)^\s*['"]?[1-5]\d\d['"]?:\s*$|\bstatus(_code)?\s*[(=:]\s*[1-5]\d\d\b|\bstatuscode::[a-z_]+|\bhttpstatus\.[a-z_]+|\.status\(\s*[1-5]\d\d\s*\)"#,
        },
        LinePattern {
            kind: ArtifactKind::VersionMarker,
            files: any_file,
            pattern: r#"(?i)/v\d+/|\bapi[-_]?version\b|^\s*version:\s*['"]?\d+\.\d+|\baccept-version\b|^\s*##?\s*\[?v?\d+\.\d+"#,
        },
        LinePattern {
            kind: ArtifactKind::Deprecation,
            files: code_or_spec,
            pattern: r#"(?i)\bdeprecated\b|#\[deprecated|\bsunset\b"#,
        },
    ]
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

fn field_name(a: &Artifact) -> String {
    let s = a.snippet.trim();
    // proto: `string email = 3;`
    if let Some((lhs, _)) = s.split_once('=') {
        if s.ends_with(';') {
            return lhs.split_whitespace().last().unwrap_or("").to_ascii_lowercase();
        }
    }
    s.split([':', '('])
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn is_real_field(a: &Artifact) -> bool {
    let name = field_name(a);
    !name.is_empty() && !SPEC_KEYWORDS.contains(&name.as_str())
}

/// A schema field removed from a file that does not add a field of the same
/// name back. Editing a field in place shows up as a removal plus an addition.
fn is_removed_field(a: &Artifact, artifacts: &[Artifact]) -> bool {
    if a.kind != ArtifactKind::SchemaField || a.change != Change::Removed || !is_real_field(a) {
        return false;
    }
    let name = field_name(a);
    !artifacts.iter().any(|b| {
        b.kind == ArtifactKind::SchemaField
            && b.change == Change::Added
            && b.file == a.file
            && field_name(b) == name
    })
}

fn removed_field_severity(hints: &ContextHints) -> Severity {
    if hints.strict_backcompat {
        Severity::Blocker
    } else {
        Severity::High
    }
}

fn escalate_for_public(base: Severity, hints: &ContextHints) -> Severity {
    if hints.public_api {
        base.escalate()
    } else {
        base
    }
}

fn is_breaking(a: &Artifact, artifacts: &[Artifact]) -> bool {
    match (a.kind, a.change) {
        (ArtifactKind::Endpoint, Change::Removed) => true,
        (ArtifactKind::SchemaField, Change::Removed) => is_removed_field(a, artifacts),
        (ArtifactKind::RequiredField, Change::Added) => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Set rules
// ---------------------------------------------------------------------------

fn breaking_without_version(artifacts: &[Artifact], _hints: &ContextHints) -> Vec<Finding> {
    let Some(anchor) = first_of(artifacts, |a| is_breaking(a, artifacts)) else {
        return Vec::new();
    };
    let bumped = artifacts
        .iter()
        .any(|a| a.kind == ArtifactKind::VersionMarker && a.change == Change::Added);
    if bumped {
        return Vec::new();
    }
    let breaking = artifacts.iter().filter(|a| is_breaking(a, artifacts)).count();
    vec![set_finding(
        "breaking-change-without-version",
        CATEGORY_VERSIONING,
        "Breaking change without version bump",
        Severity::Blocker,
        Confidence::Med,
        anchor,
        format!("{breaking} breaking change(s) and no added version marker; first: {}", anchor.snippet),
        "Introduce a new API version (path or header) and keep the old contract until clients migrate.",
    )]
}

fn removed_field(artifacts: &[Artifact], hints: &ContextHints) -> Vec<Finding> {
    artifacts
        .iter()
        .filter(|a| is_removed_field(a, artifacts))
        .map(|a| {
            set_finding(
                "removed-field",
                CATEGORY_COMPAT,
                "Field removed from schema",
                removed_field_severity(hints),
                Confidence::Med,
                a,
                a.snippet.clone(),
                "Keep the field (mark it deprecated) or ship the removal in a new API version.",
            )
        })
        .collect()
}

fn endpoint_without_spec(artifacts: &[Artifact], _hints: &ContextHints) -> Vec<Finding> {
    if !is_change_set(artifacts) {
        return Vec::new();
    }
    let spec_touched = artifacts.iter().any(|a| a.kind == ArtifactKind::ApiSpecFile);
    if spec_touched {
        return Vec::new();
    }
    artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Endpoint && a.change == Change::Added)
        .map(|a| {
            set_finding(
                "endpoint-without-spec",
                CATEGORY_DOCS,
                "Endpoint added without API spec update",
                Severity::Med,
                Confidence::Med,
                a,
                a.snippet.clone(),
                "Document the endpoint in the OpenAPI/proto definition in the same change.",
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

pub(super) fn rules() -> Vec<Check> {
    vec![
        set_rule! {
            id: "breaking-change-without-version",
            category: CATEGORY_VERSIONING,
            title: "Breaking change without version bump",
            evaluate: breaking_without_version
        },
        rule! {
            id: "removed-endpoint",
            category: CATEGORY_COMPAT,
            kinds: &[ArtifactKind::Endpoint],
            severity: |_, h| escalate_for_public(Severity::High, h),
            confidence: Confidence::Med,
            title: "Endpoint removed",
            changes: &[Change::Removed],
            remediation: "Deprecate first, announce a sunset date, and remove only after traffic drains."
        },
        set_rule! {
            id: "removed-field",
            category: CATEGORY_COMPAT,
            title: "Field removed from schema",
            evaluate: removed_field
        },
        rule! {
            id: "new-required-field",
            category: CATEGORY_COMPAT,
            kinds: &[ArtifactKind::RequiredField],
            severity: |_, h| removed_field_severity(h),
            confidence: Confidence::Low,
            title: "New required field breaks existing clients",
            changes: &[Change::Added],
            remediation: "Make the field optional with a server-side default."
        },
        rule! {
            id: "status-code-changed",
            category: CATEGORY_COMPAT,
            kinds: &[ArtifactKind::StatusCode],
            severity: |_, h| escalate_for_public(Severity::Med, h),
            confidence: Confidence::Low,
            title: "Response status code removed or changed",
            changes: &[Change::Removed],
            remediation: "Clients branch on status codes; keep the old code or version the endpoint."
        },
        rule! {
            id: "deprecation-without-sunset",
            category: CATEGORY_VERSIONING,
            kinds: &[ArtifactKind::Deprecation],
            severity: |_, _| Severity::Low,
            confidence: Confidence::Med,
            title: "Deprecation without sunset date",
            changes: &[Change::Added],
            condition: |a, _| !has(a, "sunset") && !a.snippet.chars().any(|c| c.is_ascii_digit()),
            remediation: "State when the deprecated surface will be removed."
        },
        set_rule! {
            id: "endpoint-without-spec",
            category: CATEGORY_DOCS,
            title: "Endpoint added without API spec update",
            evaluate: endpoint_without_spec
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::super::tests::{by_rule, review_diff, rule_ids};
    use crate::types::{Domain, Severity};

    const FIELD_REMOVED: &str = "\
diff --git a/api/openapi.yaml b/api/openapi.yaml
--- a/api/openapi.yaml
+++ b/api/openapi.yaml
@@ -10,4 +10,3 @@
       properties:
         id:
-        email:
         name:
";

    #[test]
    fn removed_field_is_high_and_unversioned_break_blocks() {
        let findings = review_diff(Domain::ApiContracts, FIELD_REMOVED, None);
        let f = by_rule(&findings, "removed-field");
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.location.line, 12);
        let v = by_rule(&findings, "breaking-change-without-version");
        assert_eq!(v.severity, Severity::Blocker);
    }

    #[test]
    fn field_edited_in_place_is_not_removed() {
        let raw = "\
diff --git a/api/openapi.yaml b/api/openapi.yaml
--- a/api/openapi.yaml
+++ b/api/openapi.yaml
@@ -10,3 +10,3 @@
       properties:
-        email: {type: string}
+        email: {type: string, format: email}
         name:
";
        let findings = review_diff(Domain::ApiContracts, raw, None);
        let ids = rule_ids(&findings);
        assert!(!ids.contains(&"removed-field"));
        assert!(!ids.contains(&"breaking-change-without-version"));
    }

    #[test]
    fn same_name_in_another_file_does_not_mask_removal() {
        let raw = "\
diff --git a/api/openapi.yaml b/api/openapi.yaml
--- a/api/openapi.yaml
+++ b/api/openapi.yaml
@@ -10,2 +10,1 @@
-        email:
         name:
diff --git a/api/openapi-admin.yaml b/api/openapi-admin.yaml
--- a/api/openapi-admin.yaml
+++ b/api/openapi-admin.yaml
@@ -4,1 +4,2 @@
         id:
+        email:
";
        let findings = review_diff(Domain::ApiContracts, raw, None);
        assert_eq!(by_rule(&findings, "removed-field").location.file, "api/openapi.yaml");
    }

    #[test]
    fn strict_backcompat_blocks_removed_field() {
        let findings = review_diff(
            Domain::ApiContracts,
            FIELD_REMOVED,
            Some("strict backward compatibility"),
        );
        assert_eq!(by_rule(&findings, "removed-field").severity, Severity::Blocker);
        assert_eq!(
            by_rule(&findings, "breaking-change-without-version").severity,
            Severity::Blocker
        );
    }

    #[test]
    fn version_marker_clears_set_rule() {
        let raw = "\
diff --git a/api/openapi.yaml b/api/openapi.yaml
--- a/api/openapi.yaml
+++ b/api/openapi.yaml
@@ -1,4 +1,4 @@
-  version: 1.4.0
+  version: 2.0.0
       properties:
         id:
-        email:
+        name:
";
        let findings = review_diff(Domain::ApiContracts, raw, None);
        let ids = rule_ids(&findings);
        assert!(ids.contains(&"removed-field"));
        assert!(!ids.contains(&"breaking-change-without-version"));
    }

    #[test]
    fn structural_keys_are_not_fields() {
        let raw = "\
diff --git a/api/openapi.yaml b/api/openapi.yaml
--- a/api/openapi.yaml
+++ b/api/openapi.yaml
@@ -1,2 +1,1 @@
-        properties:
         id:
";
        let findings = review_diff(Domain::ApiContracts, raw, None);
        assert!(!rule_ids(&findings).contains(&"removed-field"));
    }

    #[test]
    fn new_route_without_spec() {
        let raw = "\
diff --git a/src/routes.ts b/src/routes.ts
--- a/src/routes.ts
+++ b/src/routes.ts
@@ -1,1 +1,2 @@
 import express from 'express';
+router.get('/users/:id/orders', listOrders);
";
        let findings = review_diff(Domain::ApiContracts, raw, None);
        let f = by_rule(&findings, "endpoint-without-spec");
        assert_eq!(f.location.line, 2);
        assert_eq!(f.severity, Severity::Med);
    }

    #[test]
    fn removed_route_escalates_for_public_api() {
        let raw = "\
diff --git a/app/views.py b/app/views.py
--- a/app/views.py
+++ b/app/views.py
@@ -3,2 +3,1 @@
-@app.get(\"/legacy/report\")
 def other():
";
        let internal = review_diff(Domain::ApiContracts, raw, None);
        assert_eq!(by_rule(&internal, "removed-endpoint").severity, Severity::High);
        let public = review_diff(Domain::ApiContracts, raw, Some("public API with external consumers"));
        assert_eq!(by_rule(&public, "removed-endpoint").severity, Severity::Blocker);
    }
}

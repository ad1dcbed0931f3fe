use super::{has, set_finding};
use crate::checklist::Check;
use crate::context::ContextHints;
use crate::extract::{code_not_test, Artifact, ArtifactKind, Change, LinePattern};
use crate::types::{Confidence, Finding, Severity};
use std::collections::{BTreeMap, BTreeSet};

const CATEGORY_TIMEOUTS: &str = "timeouts";
const CATEGORY_ERRORS: &str = "error-handling";
const CATEGORY_BACKPRESSURE: &str = "backpressure";
const CATEGORY_CONCURRENCY: &str = "concurrency";

const EXISTS_AFTER: &[Change] = &[Change::Added, Change::Present];

pub(super) fn file_kind(path: &str) -> Option<ArtifactKind> {
    code_not_test(path).then_some(ArtifactKind::SourceFile)
}

pub(super) fn patterns() -> Vec<LinePattern> {
    let p = |kind: ArtifactKind, pattern: &'static str| LinePattern {
        kind,
        files: code_not_test,
        pattern,
    };
    vec![
        p(
            ArtifactKind::OutboundCall,
            r#"\breqwest::(get|Client)\b|\bclient\.(get|post|put|delete|patch)\(|\brequests\.(get|post|put|delete|patch)\(|\bhttp\.(Get|Post|NewRequest)\(|\bfetch\(|\baxios(\.\w+)?\(|\burlopen\(|\bHttpClient\b"#,
        ),
        p(
            ArtifactKind::TimeoutConfig,
            r#"(?i)\btimeout\b|\bdeadline\b|\bwith_timeout\b|\bAbortSignal\.timeout\("#,
        ),
        p(
            ArtifactKind::RetryLoop,
            r#"(?i)\bretry\b|\bretries\b|\bmax_attempts\b|\bbackoff\b"#,
        ),
        p(
            ArtifactKind::PanicPath,
            r#"\.unwrap\(\)|\.expect\(\s*"|\bpanic!\(|\bunreachable!\(|\bos\.Exit\(|\bprocess\.exit\(|\blog\.Fatal"#,
        ),
        p(
            ArtifactKind::SwallowedError,
            r#"except(\s+Exception)?\s*:\s*pass\b|catch\s*(\([^)]*\))?\s*\{\s*\}|\bif\s+err\s*!=\s*nil\s*\{\s*\}|^\s*_\s*=\s*err\b|^\s*let\s+_\s*=\s*[\w.:]+\(.*\)\s*;|\.ok\(\);"#,
        ),
        p(
            ArtifactKind::UnboundedQueue,
            r#"\bunbounded_channel\b|\bmpsc::channel\(\)|\bunbounded\(\)|\bnew\s+LinkedBlockingQueue\(\s*\)|\bqueue\.Queue\(\s*\)|\bnew\s+ConcurrentLinkedQueue\b"#,
        ),
        p(
            ArtifactKind::LockAcquire,
            r#"\.lock\(\)|\.write\(\)\.await|\.read\(\)\.await|\bsynchronized\s*\(|\bthreading\.Lock\(\)|\bmu\.Lock\(\)"#,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Tight latency objectives make every unguarded failure path worse.
fn slo_escalates(base: Severity, hints: &ContextHints) -> Severity {
    if hints.slo_ms.is_some() {
        base.escalate()
    } else {
        base
    }
}

fn held_across_await(a: &Artifact, _: &ContextHints) -> bool {
    has(a, ".await") && has(a, "lock")
}

// ---------------------------------------------------------------------------
// Set rules
// ---------------------------------------------------------------------------

fn files_with(artifacts: &[Artifact], kind: ArtifactKind) -> BTreeSet<&str> {
    artifacts
        .iter()
        .filter(|a| a.kind == kind && a.exists_after())
        .map(|a| a.file.as_str())
        .collect()
}

fn call_without_timeout(artifacts: &[Artifact], hints: &ContextHints) -> Vec<Finding> {
    let guarded = files_with(artifacts, ArtifactKind::TimeoutConfig);
    let severity = slo_escalates(Severity::High, hints);
    artifacts
        .iter()
        .filter(|a| {
            a.kind == ArtifactKind::OutboundCall
                && a.exists_after()
                && !guarded.contains(a.file.as_str())
        })
        .map(|a| {
            set_finding(
                "outbound-call-without-timeout",
                CATEGORY_TIMEOUTS,
                "Outbound call without a timeout",
                severity,
                Confidence::Med,
                a,
                a.snippet.clone(),
                "Set connect and request timeouts on the client or wrap the call in a deadline.",
            )
        })
        .collect()
}

/// One finding per file whose retry logic never mentions backoff or jitter.
fn retry_without_backoff(artifacts: &[Artifact], _hints: &ContextHints) -> Vec<Finding> {
    let mut per_file: BTreeMap<&str, Vec<&Artifact>> = BTreeMap::new();
    for a in artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::RetryLoop && a.exists_after())
    {
        per_file.entry(a.file.as_str()).or_default().push(a);
    }
    per_file
        .into_values()
        .filter(|retries| !retries.iter().any(|a| has(a, "backoff") || has(a, "jitter")))
        .filter_map(|retries| retries.first().copied())
        .map(|a| {
            set_finding(
                "retry-without-backoff",
                CATEGORY_BACKPRESSURE,
                "Retry without backoff",
                Severity::Med,
                Confidence::Low,
                a,
                a.snippet.clone(),
                "Use exponential backoff with jitter and cap the number of attempts.",
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
            id: "outbound-call-without-timeout",
            category: CATEGORY_TIMEOUTS,
            title: "Outbound call without a timeout",
            evaluate: call_without_timeout
        },
        rule! {
            id: "swallowed-error",
            category: CATEGORY_ERRORS,
            kinds: &[ArtifactKind::SwallowedError],
            severity: |_, _| Severity::High,
            confidence: Confidence::Med,
            title: "Error swallowed silently",
            changes: EXISTS_AFTER,
            remediation: "Propagate the error, or log it with context before continuing."
        },
        rule! {
            id: "timeout-removed",
            category: CATEGORY_TIMEOUTS,
            kinds: &[ArtifactKind::TimeoutConfig],
            severity: |_, h| slo_escalates(Severity::High, h),
            confidence: Confidence::Low,
            title: "Timeout configuration removed",
            changes: &[Change::Removed],
            remediation: "Keep an explicit timeout on every remote dependency."
        },
        rule! {
            id: "lock-across-await",
            category: CATEGORY_CONCURRENCY,
            kinds: &[ArtifactKind::LockAcquire],
            severity: |_, _| Severity::High,
            confidence: Confidence::Low,
            title: "Lock held across an await point",
            changes: EXISTS_AFTER,
            condition: held_across_await,
            remediation: "Drop the guard before awaiting, or use an async-aware lock scoped tightly."
        },
        rule! {
            id: "panic-path",
            category: CATEGORY_ERRORS,
            kinds: &[ArtifactKind::PanicPath],
            severity: |_, h| slo_escalates(Severity::Med, h),
            confidence: Confidence::Med,
            title: "Panic or process exit in production code",
            changes: EXISTS_AFTER,
            remediation: "Return an error to the caller instead of aborting the process."
        },
        rule! {
            id: "unbounded-queue",
            category: CATEGORY_BACKPRESSURE,
            kinds: &[ArtifactKind::UnboundedQueue],
            severity: |_, _| Severity::Med,
            confidence: Confidence::High,
            title: "Unbounded queue",
            changes: EXISTS_AFTER,
            remediation: "Bound the queue and decide what happens when it is full (block, drop, or shed)."
        },
        set_rule! {
            id: "retry-without-backoff",
            category: CATEGORY_BACKPRESSURE,
            title: "Retry without backoff",
            evaluate: retry_without_backoff
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::super::tests::{by_rule, review_files, rule_ids};
    use crate::types::{Confidence, Domain, Severity};

    const CLIENT: &str = r#"pub async fn sync(state: &State) -> Result<()> {
    let body = reqwest::get(&state.url).await?.text().await?;
    let _ = state.cache.insert(body.clone());
    let guard = state.inner.lock().await;
    let cfg = load().unwrap();
    for attempt in 0..max_attempts {
        retry(attempt);
    }
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    Ok(())
}
"#;

    #[test]
    fn flags_client_module() {
        let findings = review_files(Domain::Reliability, &[("src/sync.rs", CLIENT)], None);
        let ids = rule_ids(&findings);
        assert_eq!(by_rule(&findings, "outbound-call-without-timeout").location.line, 2);
        assert_eq!(by_rule(&findings, "swallowed-error").location.line, 3);
        assert_eq!(by_rule(&findings, "lock-across-await").location.line, 4);
        assert_eq!(by_rule(&findings, "panic-path").severity, Severity::Med);
        assert_eq!(by_rule(&findings, "unbounded-queue").confidence, Confidence::High);
        assert_eq!(
            ids.iter().filter(|id| **id == "retry-without-backoff").count(),
            1
        );
    }

    #[test]
    fn timeout_in_file_guards_calls() {
        let src = "let client = Client::builder().timeout(Duration::from_secs(2)).build()?;\nlet r = reqwest::get(url).await?;\n";
        let findings = review_files(Domain::Reliability, &[("src/api.rs", src)], None);
        assert!(!rule_ids(&findings).contains(&"outbound-call-without-timeout"));
    }

    #[test]
    fn slo_escalates_panics_and_timeouts() {
        let findings = review_files(
            Domain::Reliability,
            &[("src/sync.rs", CLIENT)],
            Some("p99 latency under 200ms"),
        );
        assert_eq!(by_rule(&findings, "panic-path").severity, Severity::High);
        assert_eq!(
            by_rule(&findings, "outbound-call-without-timeout").severity,
            Severity::Blocker
        );
    }

    #[test]
    fn tests_are_out_of_scope() {
        let findings = review_files(Domain::Reliability, &[("tests/sync_test.rs", CLIENT)], None);
        assert!(findings.is_empty());
    }
}

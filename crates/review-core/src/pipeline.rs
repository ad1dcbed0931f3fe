//! One review invocation end to end:
//! session → scope → artifacts → checklist → report → publish.

use crate::checklist::{Checklist, Predicate};
use crate::config::Config;
use crate::error::{Result, ReviewError};
use crate::extract::Extractor;
use crate::publish::{self, Published};
use crate::report::ReviewReport;
use crate::request::ReviewRequest;
use crate::scope::ScopeResolver;
use crate::session::{self, Session};
use crate::types::Domain;
use crate::vcs::Vcs;
use chrono::Utc;
use std::path::Path;

pub struct ReviewOptions {
    pub domain: Domain,
    pub request: ReviewRequest,
    /// Explicit session slug; the latest registered session otherwise.
    pub session: Option<String>,
    /// Write the report and index entry. When false the report is only
    /// composed, and a session is optional.
    pub publish: bool,
    /// Extra predicates evaluated after the built-in checklist.
    pub predicates: Vec<Box<dyn Predicate>>,
}

impl ReviewOptions {
    pub fn new(domain: Domain, request: ReviewRequest) -> Self {
        Self {
            domain,
            request,
            session: None,
            publish: true,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct ReviewOutcome {
    pub report: ReviewReport,
    /// `None` when publishing was not requested. A failed publish still
    /// carries the composed report above.
    pub published: Option<Result<Published>>,
    /// The scope held no files after filtering.
    pub scope_empty: bool,
}

impl ReviewOutcome {
    /// Where the report file landed, including after a partial write.
    pub fn report_path(&self) -> Option<&Path> {
        match self.published.as_ref()? {
            Ok(published) => Some(published.report_path.as_path()),
            Err(ReviewError::PartialWrite { report_path, .. }) => Some(report_path.as_path()),
            Err(_) => None,
        }
    }
}

pub fn run_review(
    root: &Path,
    vcs: &dyn Vcs,
    config: &Config,
    options: ReviewOptions,
) -> Result<ReviewOutcome> {
    let ReviewOptions {
        domain,
        request,
        session,
        publish,
        predicates,
    } = options;

    let session = find_session(root, session.as_deref(), publish)?;
    tracing::info!(
        domain = %domain,
        scope = %request.scope(),
        session = session.as_ref().map(|s| s.slug.as_str()).unwrap_or("-"),
        "starting review"
    );

    let scope = ScopeResolver::new(root, vcs)
        .with_exclude(config.exclude_filter()?)
        .with_max_file_bytes(config.max_file_bytes)
        .resolve(&request)?;

    let extraction = Extractor::for_domain(domain).extract(&scope, request.context());

    let mut checklist = Checklist::for_domain(domain)
        .disable(config.disabled_rules.iter().cloned())
        .with_overrides(config.overrides());
    for predicate in predicates {
        checklist = checklist.with_predicate(predicate);
    }
    let evaluation = checklist.evaluate(&extraction.artifacts, &extraction.hints);

    let report = ReviewReport::compose(
        domain,
        session,
        request,
        evaluation,
        scope.files.len(),
        Utc::now(),
    );
    tracing::info!(
        findings = report.findings().len(),
        recommendation = %report.recommendation(),
        "review complete"
    );

    let published = publish.then(|| publish::publish(root, &report, &config.reviews_dir));

    Ok(ReviewOutcome {
        report,
        published,
        scope_empty: scope.is_empty(),
    })
}

fn find_session(root: &Path, explicit: Option<&str>, required: bool) -> Result<Option<Session>> {
    match session::locate(root, explicit) {
        Ok(s) => Ok(Some(s)),
        Err(ReviewError::NoSessionFound) if !required => Ok(None),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::finding_at;
    use crate::context::ContextHints;
    use crate::extract::Artifact;
    use crate::report::parse_front_matter;
    use crate::scope::tests::FakeVcs;
    use crate::session::SessionRegistry;
    use crate::types::{Confidence, Finding, Recommendation, Scope, Severity};
    use tempfile::TempDir;

    const MIGRATION_DIFF: &str = "\
diff --git a/db/migrations/0042_add_age.sql b/db/migrations/0042_add_age.sql
new file mode 100644
--- /dev/null
+++ b/db/migrations/0042_add_age.sql
@@ -0,0 +1,1 @@
+ALTER TABLE users ADD COLUMN age INT NOT NULL;
";

    fn project(slug: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        SessionRegistry::create(dir.path(), slug).unwrap();
        dir
    }

    fn request(scope: Scope, target: Option<&str>, paths: &[&str]) -> ReviewRequest {
        ReviewRequest::new(
            scope,
            target.map(str::to_string),
            paths.iter().map(|p| p.to_string()).collect(),
            None,
        )
        .unwrap()
    }

    fn reviews_dir(dir: &TempDir, slug: &str) -> std::path::PathBuf {
        dir.path().join(".claude").join(slug).join("reviews")
    }

    #[test]
    fn pr_review_end_to_end() {
        let dir = project("add-api-endpoint");
        std::fs::create_dir_all(dir.path().join("db/migrations")).unwrap();
        std::fs::write(
            dir.path().join("db/migrations/0042_add_age.sql"),
            "ALTER TABLE users ADD COLUMN age INT NOT NULL;\n",
        )
        .unwrap();
        let vcs = FakeVcs::with_diff(MIGRATION_DIFF);

        let outcome = run_review(
            dir.path(),
            &vcs,
            &Config::default(),
            ReviewOptions::new(Domain::Migrations, request(Scope::Pr, Some("#42"), &[])),
        )
        .unwrap();

        assert_eq!(vcs.calls.borrow().as_slice(), ["pr 42"]);
        let report = &outcome.report;
        assert_eq!(report.recommendation(), Recommendation::Block);
        assert_eq!(report.findings()[0].id, "MIG-001");
        assert_eq!(report.findings()[0].rule, "not-null-without-default");
        assert_eq!(report.session().unwrap().slug, "add-api-endpoint");

        let published = outcome.published.unwrap().unwrap();
        let md = std::fs::read_to_string(&published.report_path).unwrap();
        let fm = parse_front_matter(&md).unwrap();
        assert_eq!(fm.command, "/review:migrations");
        assert_eq!(fm.scope, Scope::Pr);
        assert_eq!(fm.target.as_deref(), Some("#42"));
        let index = std::fs::read_to_string(&published.index_path).unwrap();
        assert!(index.contains("BLOCK (2 findings)"));
    }

    #[test]
    fn missing_file_target_fails_without_writing() {
        let dir = project("s");
        let vcs = FakeVcs::default();
        let err = run_review(
            dir.path(),
            &vcs,
            &Config::default(),
            ReviewOptions::new(Domain::Testing, request(Scope::File, Some("nope/missing.rs"), &[])),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::FileNotFound(_)));
        assert!(!reviews_dir(&dir, "s").exists());
    }

    #[test]
    fn empty_scope_still_reports_approve() {
        let dir = project("s");
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn a() { x.unwrap(); }\n").unwrap();
        let vcs = FakeVcs::default();
        let outcome = run_review(
            dir.path(),
            &vcs,
            &Config::default(),
            ReviewOptions::new(
                Domain::Reliability,
                request(Scope::Repo, None, &["nonexistent/**"]),
            ),
        )
        .unwrap();
        assert!(outcome.scope_empty);
        assert!(outcome.report.findings().is_empty());
        assert_eq!(outcome.report.recommendation(), Recommendation::Approve);
        assert!(outcome.published.unwrap().unwrap().report_path.exists());
    }

    #[test]
    fn vcs_failure_is_fatal_and_writes_nothing() {
        let dir = project("s");
        let vcs = FakeVcs {
            fail: true,
            ..Default::default()
        };
        let err = run_review(
            dir.path(),
            &vcs,
            &Config::default(),
            ReviewOptions::new(Domain::Release, request(Scope::Worktree, None, &[])),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::Vcs { .. }));
        assert_eq!(vcs.calls.borrow().len(), 1);
        assert!(!reviews_dir(&dir, "s").exists());
    }

    #[test]
    fn no_session_fails_before_touching_vcs() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::with_diff(MIGRATION_DIFF);
        let err = run_review(
            dir.path(),
            &vcs,
            &Config::default(),
            ReviewOptions::new(Domain::Migrations, request(Scope::Pr, Some("1"), &[])),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::NoSessionFound));
        assert!(vcs.calls.borrow().is_empty());
    }

    #[test]
    fn unpublished_review_needs_no_session() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::with_diff(MIGRATION_DIFF);
        let mut options = ReviewOptions::new(Domain::Migrations, request(Scope::Pr, Some("1"), &[]));
        options.publish = false;
        let outcome = run_review(dir.path(), &vcs, &Config::default(), options).unwrap();
        assert!(outcome.published.is_none());
        assert!(outcome.report.session().is_none());
        assert_eq!(outcome.report.recommendation(), Recommendation::Block);
        assert!(!dir.path().join(".claude").exists());
    }

    #[test]
    fn config_disables_and_overrides_rules() {
        let dir = project("s");
        let vcs = FakeVcs::with_diff(MIGRATION_DIFF);
        let config = Config {
            disabled_rules: vec!["missing-down-migration".into()],
            severity_overrides: [("not-null-without-default".to_string(), Severity::Low)]
                .into_iter()
                .collect(),
            ..Config::default()
        };
        let outcome = run_review(
            dir.path(),
            &vcs,
            &config,
            ReviewOptions::new(Domain::Migrations, request(Scope::Pr, Some("1"), &[])),
        )
        .unwrap();
        let rules: Vec<_> = outcome.report.findings().iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, ["not-null-without-default"]);
        assert_eq!(
            outcome.report.recommendation(),
            Recommendation::ApproveWithComments
        );
    }

    struct FlagEverySql;

    impl Predicate for FlagEverySql {
        fn id(&self) -> &str {
            "reasoned-data-loss"
        }

        fn applies_to(&self, artifact: &Artifact) -> bool {
            artifact.file.ends_with(".sql") && !artifact.is_file_level()
        }

        fn evaluate(&self, artifact: &Artifact, _hints: &ContextHints) -> Option<Finding> {
            Some(finding_at(
                self.id(),
                "judgment",
                "Possible data loss",
                Severity::High,
                Confidence::Low,
                artifact,
                None,
            ))
        }
    }

    #[test]
    fn injected_predicates_join_the_report() {
        let dir = project("s");
        let vcs = FakeVcs::with_diff(MIGRATION_DIFF);
        let mut options = ReviewOptions::new(Domain::Migrations, request(Scope::Pr, Some("1"), &[]));
        options.predicates.push(Box::new(FlagEverySql));
        let outcome = run_review(dir.path(), &vcs, &Config::default(), options).unwrap();
        let injected: Vec<_> = outcome
            .report
            .findings()
            .iter()
            .filter(|f| f.rule == "reasoned-data-loss")
            .collect();
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].location.line, 1);
    }

    #[test]
    fn partial_write_keeps_the_report() {
        let dir = project("s");
        let index = dir.path().join(".claude/s/README.md");
        std::fs::remove_file(&index).unwrap();
        std::fs::create_dir(&index).unwrap();
        let vcs = FakeVcs::with_diff(MIGRATION_DIFF);

        let outcome = run_review(
            dir.path(),
            &vcs,
            &Config::default(),
            ReviewOptions::new(Domain::Migrations, request(Scope::Pr, Some("1"), &[])),
        )
        .unwrap();

        assert_eq!(outcome.report.recommendation(), Recommendation::Block);
        assert!(outcome.report_path().unwrap().exists());
        assert!(matches!(
            outcome.published,
            Some(Err(ReviewError::PartialWrite {
                report_written: true,
                index_written: false,
                ..
            }))
        ));
    }
}

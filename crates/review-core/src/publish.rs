//! Persisting a composed report into its session.
//!
//! Two writes happen in order: the report file (atomic, never overwriting an
//! earlier report) and one line appended to the session index under an
//! exclusive lock. A failure in the first leaves nothing behind; a failure in
//! the second is reported as [`ReviewError::PartialWrite`].

use crate::error::{Result, ReviewError};
use crate::io;
use crate::paths;
use crate::report::ReviewReport;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Gives up picking a fresh report name after this many collisions.
const MAX_NAME_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct Published {
    pub report_path: PathBuf,
    pub index_path: PathBuf,
}

/// Write `report` under `.claude/<session>/<reviews_dir>/` and link it from
/// the session index.
pub fn publish(root: &Path, report: &ReviewReport, reviews_dir: &str) -> Result<Published> {
    let session = report.session().ok_or(ReviewError::NoSessionFound)?;
    let dir = paths::reviews_dir(root, &session.slug, reviews_dir);
    let date = report.completed().date_naive();
    let markdown = report.render_markdown();

    let report_path = write_report(&dir, report, date, &markdown)?;
    tracing::info!(path = %report_path.display(), "wrote review report");

    let index_path = paths::session_index_path(root, &session.slug);
    let session_dir = paths::session_dir(root, &session.slug);
    let line = index_line(report, &paths::display_relative(&session_dir, &report_path));

    let appended = io::append_locked(
        &index_path,
        &paths::session_index_header(&session.slug),
        &line,
    );

    if let Err(e) = appended {
        tracing::error!(
            index = %index_path.display(),
            error = %e,
            "report written but session index not updated"
        );
        return Err(ReviewError::PartialWrite {
            report_path,
            report_written: true,
            index_written: false,
            source: Box::new(e),
        });
    }
    tracing::debug!(index = %index_path.display(), "appended session index entry");

    Ok(Published {
        report_path,
        index_path,
    })
}

fn write_report(
    dir: &Path,
    report: &ReviewReport,
    date: chrono::NaiveDate,
    markdown: &str,
) -> Result<PathBuf> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = paths::next_report_path(dir, report.domain(), date);
        // Another writer may claim the same name between the check and the
        // write; in that case pick the next free one.
        if io::atomic_create(&path, markdown.as_bytes())? {
            return Ok(path);
        }
    }
    Err(ReviewError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free report name under {}", dir.display()),
    )))
}

/// One index entry: link, completion time, recommendation, finding count.
pub fn index_line(report: &ReviewReport, relative_path: &str) -> String {
    format!(
        "- [{}]({}) {} {} ({} findings)\n",
        report.domain().title(),
        relative_path,
        report.completed().format("%Y-%m-%d %H:%M UTC"),
        report.recommendation(),
        report.findings().len()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::Evaluation;
    use crate::request::ReviewRequest;
    use crate::session::Session;
    use crate::types::{Domain, Scope};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn report(session: Option<Session>) -> ReviewReport {
        ReviewReport::compose(
            Domain::Testing,
            session,
            ReviewRequest::new(Scope::Repo, None, Vec::new(), None).unwrap(),
            Evaluation::default(),
            0,
            Utc.with_ymd_and_hms(2026, 10, 18, 14, 5, 0).unwrap(),
        )
    }

    #[test]
    fn writes_report_and_index_line() {
        let dir = TempDir::new().unwrap();
        let report = report(Some(Session::unregistered("fix-auth-bug")));
        let published = publish(dir.path(), &report, "reviews").unwrap();

        assert_eq!(
            published.report_path,
            dir.path()
                .join(".claude/fix-auth-bug/reviews/testing-2026-10-18.md")
        );
        let md = std::fs::read_to_string(&published.report_path).unwrap();
        assert_eq!(md, report.render_markdown());

        let index = std::fs::read_to_string(&published.index_path).unwrap();
        assert!(index.starts_with("# fix-auth-bug\n"));
        assert!(index.contains(
            "- [Testing Review](reviews/testing-2026-10-18.md) 2026-10-18 14:05 UTC APPROVE (0 findings)\n"
        ));
    }

    #[test]
    fn same_day_reports_get_suffixes() {
        let dir = TempDir::new().unwrap();
        let report = report(Some(Session::unregistered("s")));
        let first = publish(dir.path(), &report, "reviews").unwrap();
        let second = publish(dir.path(), &report, "reviews").unwrap();
        assert_ne!(first.report_path, second.report_path);
        assert!(second
            .report_path
            .ends_with("reviews/testing-2026-10-18-2.md"));
        let index = std::fs::read_to_string(&second.index_path).unwrap();
        assert_eq!(index.lines().filter(|l| l.starts_with("- [")).count(), 2);
    }

    #[test]
    fn index_failure_is_partial_write() {
        let dir = TempDir::new().unwrap();
        // A directory where the index file should be makes the append fail.
        std::fs::create_dir_all(dir.path().join(".claude/s/README.md")).unwrap();
        let report = report(Some(Session::unregistered("s")));
        match publish(dir.path(), &report, "reviews") {
            Err(ReviewError::PartialWrite {
                report_path,
                report_written,
                index_written,
                ..
            }) => {
                assert!(report_written);
                assert!(!index_written);
                assert!(report_path.exists());
            }
            other => panic!("expected PartialWrite, got {other:?}"),
        }
    }

    #[test]
    fn report_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".claude/s")).unwrap();
        // A file where the reviews directory should be.
        std::fs::write(dir.path().join(".claude/s/reviews"), "not a dir").unwrap();
        let report = report(Some(Session::unregistered("s")));
        let err = publish(dir.path(), &report, "reviews").unwrap_err();
        assert!(!matches!(err, ReviewError::PartialWrite { .. }));
        assert!(!dir.path().join(".claude/s/README.md").exists());
    }

    #[test]
    fn needs_a_session() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            publish(dir.path(), &report(None), "reviews"),
            Err(ReviewError::NoSessionFound)
        ));
    }

    #[test]
    fn concurrent_publishes_into_fresh_session_keep_every_line() {
        let dir = TempDir::new().unwrap();
        let report = report(Some(Session::unregistered("fresh")));
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| publish(dir.path(), &report, "reviews").unwrap());
            }
        });

        let index =
            std::fs::read_to_string(dir.path().join(".claude/fresh/README.md")).unwrap();
        assert!(index.starts_with("# fresh\n\n## Artifacts\n\n"));
        assert_eq!(index.matches("# fresh").count(), 1);
        assert_eq!(index.lines().filter(|l| l.starts_with("- [")).count(), 8);
        let reports = std::fs::read_dir(dir.path().join(".claude/fresh/reviews"))
            .unwrap()
            .count();
        assert_eq!(reports, 8);
    }

    #[test]
    fn lock_left_by_a_dead_writer_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join(".claude/s/README.md.lock");
        std::fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
        let lock = std::fs::File::create(&lock_path).unwrap();
        lock.set_modified(std::time::SystemTime::now() - io::LOCK_TIMEOUT * 3)
            .unwrap();
        drop(lock);

        let report = report(Some(Session::unregistered("s")));
        let published = publish(dir.path(), &report, "reviews").unwrap();
        let index = std::fs::read_to_string(&published.index_path).unwrap();
        assert_eq!(index.lines().filter(|l| l.starts_with("- [")).count(), 1);
        assert!(!lock_path.exists());
    }
}

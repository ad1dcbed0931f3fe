use crate::error::{Result, ReviewError};
use crate::types::Scope;
use serde::{Deserialize, Serialize};

/// A validated review invocation. Construct with [`ReviewRequest::new`]; an
/// existing request is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

/// The two ends of a `ref1..ref2` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRange {
    pub from: String,
    pub to: String,
}

impl ReviewRequest {
    pub fn new(
        scope: Scope,
        target: Option<String>,
        paths: Vec<String>,
        context: Option<String>,
    ) -> Result<Self> {
        let target = target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let context = context
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let paths = paths
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if scope.requires_target() && target.is_none() {
            return Err(ReviewError::MissingTarget {
                scope: scope.to_string(),
            });
        }

        let request = Self {
            scope,
            target,
            paths,
            context,
        };
        match scope {
            Scope::Diff => {
                request.ref_range()?;
            }
            Scope::Pr => {
                request.pr_selector()?;
            }
            Scope::Repo => {
                if let Some(t) = &request.target {
                    tracing::debug!(target = %t, "repo scope ignores target");
                }
            }
            Scope::Worktree | Scope::File => {}
        }
        Ok(request)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// `ref1..ref2` split into its ends. Three-dot ranges are accepted and
    /// treated the same way.
    pub fn ref_range(&self) -> Result<RefRange> {
        let target = self.target.as_deref().ok_or_else(|| ReviewError::MissingTarget {
            scope: self.scope.to_string(),
        })?;
        let invalid = || ReviewError::InvalidTargetFormat {
            scope: self.scope.to_string(),
            target: target.to_string(),
            expected: "ref1..ref2".to_string(),
        };
        let (from, to) = target
            .split_once("...")
            .or_else(|| target.split_once(".."))
            .ok_or_else(invalid)?;
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(invalid());
        }
        Ok(RefRange {
            from: from.trim().to_string(),
            to: to.trim().to_string(),
        })
    }

    /// Selector handed to `gh pr diff`: a PR number (optionally
    /// `#`-prefixed), a PR URL, or the PR's head branch name.
    pub fn pr_selector(&self) -> Result<String> {
        let target = self.target.as_deref().ok_or_else(|| ReviewError::MissingTarget {
            scope: self.scope.to_string(),
        })?;
        let number = target
            .rsplit('/')
            .next()
            .unwrap_or(target)
            .trim_start_matches('#');
        if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
            return Ok(number.to_string());
        }
        // Leading `-` would reach `gh` as a flag.
        let branch_like = !target.starts_with('-')
            && !target.contains("..")
            && target
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'));
        if branch_like {
            return Ok(target.to_string());
        }
        Err(ReviewError::InvalidTargetFormat {
            scope: self.scope.to_string(),
            target: target.to_string(),
            expected: "a PR number, PR URL, or branch name".to_string(),
        })
    }

    /// File-scope targets: whitespace- or comma-separated paths.
    pub fn file_targets(&self) -> Vec<String> {
        self.target
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(scope: Scope, target: Option<&str>) -> Result<ReviewRequest> {
        ReviewRequest::new(scope, target.map(str::to_string), Vec::new(), None)
    }

    #[test]
    fn pr_without_target_is_missing_target() {
        assert!(matches!(
            req(Scope::Pr, None),
            Err(ReviewError::MissingTarget { .. })
        ));
        assert!(matches!(
            req(Scope::Pr, Some("   ")),
            Err(ReviewError::MissingTarget { .. })
        ));
    }

    #[test]
    fn pr_accepts_number_hash_url_and_branch() {
        let selector = |t: &str| req(Scope::Pr, Some(t)).unwrap().pr_selector().unwrap();
        assert_eq!(selector("123"), "123");
        assert_eq!(selector("#45"), "45");
        assert_eq!(selector("https://github.com/o/r/pull/77"), "77");
        assert_eq!(selector("feature-branch"), "feature-branch");
        assert_eq!(selector("user/login-flow"), "user/login-flow");
    }

    #[test]
    fn pr_rejects_flags_and_ranges() {
        for bad in ["--web", "main..feature", "two words"] {
            assert!(
                matches!(
                    req(Scope::Pr, Some(bad)),
                    Err(ReviewError::InvalidTargetFormat { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn diff_requires_range_separator() {
        assert!(matches!(
            req(Scope::Diff, Some("main")),
            Err(ReviewError::InvalidTargetFormat { .. })
        ));
        assert!(matches!(
            req(Scope::Diff, Some("main..")),
            Err(ReviewError::InvalidTargetFormat { .. })
        ));
        let r = req(Scope::Diff, Some("main..feature")).unwrap();
        assert_eq!(
            r.ref_range().unwrap(),
            RefRange {
                from: "main".into(),
                to: "feature".into()
            }
        );
        let r = req(Scope::Diff, Some("v1.0...HEAD")).unwrap();
        assert_eq!(r.ref_range().unwrap().from, "v1.0");
    }

    #[test]
    fn file_requires_target_and_splits_list() {
        assert!(matches!(
            req(Scope::File, None),
            Err(ReviewError::MissingTarget { .. })
        ));
        let r = req(Scope::File, Some("src/a.rs, src/b.rs  src/c.rs")).unwrap();
        assert_eq!(r.file_targets(), vec!["src/a.rs", "src/b.rs", "src/c.rs"]);
    }

    #[test]
    fn repo_and_worktree_need_no_target() {
        assert!(req(Scope::Repo, None).is_ok());
        assert!(req(Scope::Repo, Some("ignored")).is_ok());
        assert!(req(Scope::Worktree, None).is_ok());
    }

    #[test]
    fn blank_paths_and_context_dropped() {
        let r = ReviewRequest::new(
            Scope::Repo,
            None,
            vec!["src/**".into(), " ".into()],
            Some("  ".into()),
        )
        .unwrap();
        assert_eq!(r.paths(), ["src/**".to_string()]);
        assert!(r.context().is_none());
    }
}

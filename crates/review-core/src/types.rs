use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Pr,
    Worktree,
    Diff,
    Repo,
    File,
}

impl Scope {
    pub fn all() -> &'static [Scope] {
        &[
            Scope::Pr,
            Scope::Worktree,
            Scope::Diff,
            Scope::Repo,
            Scope::File,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Pr => "pr",
            Scope::Worktree => "worktree",
            Scope::Diff => "diff",
            Scope::Repo => "repo",
            Scope::File => "file",
        }
    }

    /// Whether this scope is meaningless without a target.
    pub fn requires_target(self) -> bool {
        matches!(self, Scope::Pr | Scope::Diff | Scope::File)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = crate::error::ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pr" => Ok(Scope::Pr),
            "worktree" => Ok(Scope::Worktree),
            "diff" => Ok(Scope::Diff),
            "repo" => Ok(Scope::Repo),
            "file" => Ok(Scope::File),
            _ => Err(crate::error::ReviewError::InvalidScope(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// The review checklist a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    ApiContracts,
    FrontendPerformance,
    Migrations,
    Release,
    Reliability,
    Testing,
}

impl Domain {
    pub fn all() -> &'static [Domain] {
        &[
            Domain::ApiContracts,
            Domain::FrontendPerformance,
            Domain::Migrations,
            Domain::Release,
            Domain::Reliability,
            Domain::Testing,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::ApiContracts => "api-contracts",
            Domain::FrontendPerformance => "frontend-performance",
            Domain::Migrations => "migrations",
            Domain::Release => "release",
            Domain::Reliability => "reliability",
            Domain::Testing => "testing",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Domain::ApiContracts => "API Contract Review",
            Domain::FrontendPerformance => "Frontend Performance Review",
            Domain::Migrations => "Migration Safety Review",
            Domain::Release => "Release Review",
            Domain::Reliability => "Reliability Review",
            Domain::Testing => "Testing Review",
        }
    }

    /// Prefix used for finding IDs (`API-001`).
    pub fn finding_prefix(self) -> &'static str {
        match self {
            Domain::ApiContracts => "API",
            Domain::FrontendPerformance => "FE",
            Domain::Migrations => "MIG",
            Domain::Release => "REL",
            Domain::Reliability => "RLY",
            Domain::Testing => "TST",
        }
    }

    /// The command name recorded in report front-matter.
    pub fn command(self) -> String {
        format!("/review:{}", self.as_str())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = crate::error::ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let normalized = normalized.strip_prefix("review:").unwrap_or(&normalized);
        Domain::all()
            .iter()
            .copied()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| crate::error::ReviewError::InvalidDomain(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Ordered most severe first, so an ascending sort lists BLOCKERs at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Blocker,
    High,
    Med,
    Low,
    Nit,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Blocker,
            Severity::High,
            Severity::Med,
            Severity::Low,
            Severity::Nit,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Blocker => "BLOCKER",
            Severity::High => "HIGH",
            Severity::Med => "MED",
            Severity::Low => "LOW",
            Severity::Nit => "NIT",
        }
    }

    /// One step more severe, saturating at BLOCKER.
    pub fn escalate(self) -> Severity {
        match self {
            Severity::Blocker | Severity::High => Severity::Blocker,
            Severity::Med => Severity::High,
            Severity::Low => Severity::Med,
            Severity::Nit => Severity::Low,
        }
    }

    /// One step less severe, saturating at NIT.
    pub fn relax(self) -> Severity {
        match self {
            Severity::Blocker => Severity::High,
            Severity::High => Severity::Med,
            Severity::Med => Severity::Low,
            Severity::Low | Severity::Nit => Severity::Nit,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::error::ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLOCKER" => Ok(Severity::Blocker),
            "HIGH" => Ok(Severity::High),
            "MED" | "MEDIUM" => Ok(Severity::Med),
            "LOW" => Ok(Severity::Low),
            "NIT" => Ok(Severity::Nit),
            _ => Err(crate::error::ReviewError::InvalidSeverity(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// Ordered most confident first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Med,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Med => "Med",
            Confidence::Low => "Low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Confidence {
    type Err = crate::error::ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "med" | "medium" => Ok(Confidence::Med),
            "low" => Ok(Confidence::Low),
            _ => Err(crate::error::ReviewError::InvalidConfidence(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Block,
    RequestChanges,
    ApproveWithComments,
    Approve,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Block => "BLOCK",
            Recommendation::RequestChanges => "REQUEST_CHANGES",
            Recommendation::ApproveWithComments => "APPROVE_WITH_COMMENTS",
            Recommendation::Approve => "APPROVE",
        }
    }

    /// Derive the merge recommendation from the most severe finding present.
    pub fn from_severities<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        match severities.into_iter().min() {
            Some(Severity::Blocker) => Recommendation::Block,
            Some(Severity::High) => Recommendation::RequestChanges,
            Some(Severity::Med) | Some(Severity::Low) => Recommendation::ApproveWithComments,
            Some(Severity::Nit) | None => Recommendation::Approve,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One reported issue. `id` is empty until the report assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub id: String,
    pub rule: String,
    pub title: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub category: String,
    pub location: Location,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

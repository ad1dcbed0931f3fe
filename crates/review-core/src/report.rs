//! Report composition and rendering.
//!
//! A [`ReviewReport`] is only built through [`ReviewReport::compose`], which
//! sorts the findings, numbers them, and derives the counts and the merge
//! recommendation from them. Nothing mutates a report afterwards.

use crate::checklist::Evaluation;
use crate::request::ReviewRequest;
use crate::session::Session;
use crate::types::{Domain, Finding, Recommendation, Scope, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// ReviewReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport {
    domain: Domain,
    session: Option<Session>,
    request: ReviewRequest,
    findings: Vec<Finding>,
    summary_counts: BTreeMap<Severity, usize>,
    recommendation: Recommendation,
    completed: DateTime<Utc>,
    files_reviewed: usize,
    rules_evaluated: usize,
}

impl ReviewReport {
    pub fn compose(
        domain: Domain,
        session: Option<Session>,
        request: ReviewRequest,
        evaluation: Evaluation,
        files_reviewed: usize,
        completed: DateTime<Utc>,
    ) -> Self {
        let mut findings = evaluation.findings;
        // Stable: equal severity and confidence keep checklist order.
        findings.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then(a.confidence.cmp(&b.confidence))
        });
        let prefix = domain.finding_prefix();
        for (i, f) in findings.iter_mut().enumerate() {
            f.id = format!("{prefix}-{:03}", i + 1);
        }

        let mut summary_counts: BTreeMap<Severity, usize> =
            Severity::all().iter().map(|s| (*s, 0)).collect();
        for f in &findings {
            *summary_counts.entry(f.severity).or_default() += 1;
        }
        let recommendation = Recommendation::from_severities(findings.iter().map(|f| f.severity));

        Self {
            domain,
            session,
            request,
            findings,
            summary_counts,
            recommendation,
            completed,
            files_reviewed,
            rules_evaluated: evaluation.rules_evaluated,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn request(&self) -> &ReviewRequest {
        &self.request
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn summary_counts(&self) -> &BTreeMap<Severity, usize> {
        &self.summary_counts
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.summary_counts.get(&severity).copied().unwrap_or(0)
    }

    pub fn recommendation(&self) -> Recommendation {
        self.recommendation
    }

    pub fn completed(&self) -> DateTime<Utc> {
        self.completed
    }

    pub fn files_reviewed(&self) -> usize {
        self.files_reviewed
    }

    pub fn rules_evaluated(&self) -> usize {
        self.rules_evaluated
    }

    pub fn front_matter(&self) -> ReportFrontMatter {
        ReportFrontMatter {
            command: self.domain.command(),
            session_slug: self.session.as_ref().map(|s| s.slug.clone()),
            scope: self.request.scope(),
            target: self.request.target().map(str::to_string),
            paths: self.request.paths().to_vec(),
            completed: self.completed,
            recommendation: self.recommendation,
        }
    }

    // -----------------------------------------------------------------------
    // Markdown
    // -----------------------------------------------------------------------

    /// Render the full report. Output depends only on the report's contents.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let fm = serde_yaml::to_string(&self.front_matter()).unwrap_or_default();
        out.push_str("---\n");
        out.push_str(&fm);
        if !fm.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n\n");
        let _ = writeln!(out, "# {}\n", self.domain.title());

        self.render_summary(&mut out);
        self.render_findings(&mut out);
        self.render_breakdown(&mut out);
        self.render_recommendations(&mut out);
        out
    }

    fn render_summary(&self, out: &mut String) {
        out.push_str("## Summary\n\n");
        let _ = writeln!(out, "**Recommendation:** {}\n", self.recommendation);
        out.push_str("| Severity | Count |\n|----------|-------|\n");
        for (severity, count) in &self.summary_counts {
            let _ = writeln!(out, "| {severity} | {count} |");
        }
        out.push('\n');
        let _ = writeln!(
            out,
            "- Scope: `{}`{}",
            self.request.scope(),
            self.request
                .target()
                .map(|t| format!(" ({})", code(t)))
                .unwrap_or_default()
        );
        if !self.request.paths().is_empty() {
            let paths: Vec<String> = self.request.paths().iter().map(|p| code(p)).collect();
            let _ = writeln!(out, "- Paths: {}", paths.join(", "));
        }
        if let Some(ctx) = self.request.context() {
            let _ = writeln!(out, "- Context: {ctx}");
        }
        let _ = writeln!(out, "- Files reviewed: {}", self.files_reviewed);
        let _ = writeln!(out, "- Rules evaluated: {}", self.rules_evaluated);
        out.push('\n');
    }

    fn render_findings(&self, out: &mut String) {
        out.push_str("## Findings\n\n");
        if self.findings.is_empty() {
            out.push_str("_No findings._\n\n");
            return;
        }
        for f in &self.findings {
            let _ = writeln!(out, "### {} [{}] {}\n", f.id, f.severity, f.title);
            let _ = writeln!(out, "- **Location:** {}", code(&f.location.to_string()));
            let _ = writeln!(out, "- **Confidence:** {}", f.confidence);
            let _ = writeln!(out, "- **Rule:** {} ({})", code(&f.rule), f.category);
            let _ = writeln!(out, "- **Evidence:** {}", code(&f.evidence));
            if let Some(fix) = &f.remediation {
                let _ = writeln!(out, "- **Remediation:** {fix}");
            }
            out.push('\n');
        }
    }

    fn render_breakdown(&self, out: &mut String) {
        out.push_str("## Breakdown\n\n");
        if self.findings.is_empty() {
            out.push_str("_Nothing to break down._\n\n");
            return;
        }

        out.push_str("### By category\n\n| Category |");
        for s in Severity::all() {
            let _ = write!(out, " {s} |");
        }
        out.push_str("\n|----------|");
        for _ in Severity::all() {
            out.push_str("----|");
        }
        out.push('\n');
        let mut by_category: BTreeMap<&str, BTreeMap<Severity, usize>> = BTreeMap::new();
        for f in &self.findings {
            *by_category
                .entry(f.category.as_str())
                .or_default()
                .entry(f.severity)
                .or_default() += 1;
        }
        for (category, counts) in &by_category {
            let _ = write!(out, "| {} |", cell(category));
            for s in Severity::all() {
                let _ = write!(out, " {} |", counts.get(s).copied().unwrap_or(0));
            }
            out.push('\n');
        }
        out.push('\n');

        out.push_str("### By file\n\n| File | Findings | Most severe |\n|------|----------|-------------|\n");
        let mut by_file: BTreeMap<&str, (usize, Severity)> = BTreeMap::new();
        for f in &self.findings {
            let entry = by_file
                .entry(f.location.file.as_str())
                .or_insert((0, f.severity));
            entry.0 += 1;
            entry.1 = entry.1.min(f.severity);
        }
        for (file, (count, worst)) in &by_file {
            let _ = writeln!(out, "| {} | {count} | {worst} |", cell(file));
        }
        out.push('\n');
    }

    fn render_recommendations(&self, out: &mut String) {
        out.push_str("## Recommendations\n\n");
        let actionable: Vec<&Finding> = self
            .findings
            .iter()
            .filter(|f| f.severity <= Severity::Low)
            .collect();
        if actionable.is_empty() {
            let _ = writeln!(
                out,
                "No changes required. Recommendation: {}.",
                self.recommendation
            );
            return;
        }
        let _ = writeln!(out, "Recommendation: **{}**\n", self.recommendation);
        for (i, f) in actionable.iter().enumerate() {
            let action = f.remediation.as_deref().unwrap_or(f.title.as_str());
            let _ = writeln!(out, "{}. [{}] {} ({})", i + 1, f.id, action, f.location);
        }
    }

    // -----------------------------------------------------------------------
    // Console
    // -----------------------------------------------------------------------

    /// Counts per severity plus the titles of BLOCKER and HIGH findings.
    pub fn console_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", self.domain.title(), self.recommendation);
        let counts: Vec<String> = self
            .summary_counts
            .iter()
            .map(|(s, n)| format!("{s} {n}"))
            .collect();
        let _ = writeln!(out, "  {}", counts.join("  "));
        for f in self
            .findings
            .iter()
            .filter(|f| matches!(f.severity, Severity::Blocker | Severity::High))
        {
            let _ = writeln!(out, "  [{}] {} {} ({})", f.severity, f.id, f.title, f.location);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFrontMatter {
    pub command: String,
    #[serde(default)]
    pub session_slug: Option<String>,
    pub scope: Scope,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    pub completed: DateTime<Utc>,
    pub recommendation: Recommendation,
}

/// Extract the YAML content between the first pair of `---` delimiters.
fn extract_front_matter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let rest = if let Some(r) = rest.strip_prefix('\n') {
        r
    } else if let Some(r) = rest.strip_prefix("\r\n") {
        r
    } else {
        return None;
    };
    let end = rest.find("\n---")?;
    Some(&rest[..end])
}

/// Recover the metadata block of a rendered report.
pub fn parse_front_matter(markdown: &str) -> Option<ReportFrontMatter> {
    let fm = extract_front_matter(markdown)?;
    serde_yaml::from_str(fm).ok()
}

// ---------------------------------------------------------------------------
// Markdown helpers
// ---------------------------------------------------------------------------

/// Inline code that survives backticks in the text.
fn code(text: &str) -> String {
    if text.contains('`') {
        format!("`` {text} ``")
    } else {
        format!("`{text}`")
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

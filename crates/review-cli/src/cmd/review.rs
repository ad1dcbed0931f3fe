use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use review_core::{
    config::Config,
    paths,
    pipeline::{run_review, ReviewOptions},
    request::ReviewRequest,
    types::{Domain, Scope},
    vcs::GitRepo,
};
use std::path::Path;

#[derive(Args)]
pub struct ReviewArgs {
    /// pr, worktree, diff, repo, or file (default from .claude/review.yaml, else pr)
    scope: Option<String>,

    /// pr: number, URL, or branch; worktree: base ref; diff: ref1..ref2; file: paths
    target: Vec<String>,

    /// Only review files matching this glob (repeatable)
    #[arg(long = "paths", value_name = "GLOB")]
    paths: Vec<String>,

    /// Free-text hints, e.g. "postgres 11, zero-downtime"
    #[arg(long)]
    context: Option<String>,

    /// Session to file the report under (default: latest)
    #[arg(long)]
    session: Option<String>,

    /// Print the report instead of writing it
    #[arg(long)]
    stdout: bool,
}

pub fn run(root: &Path, domain: Domain, args: ReviewArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let scope: Scope = match &args.scope {
        Some(s) => s.parse()?,
        None => config.default_scope,
    };
    let target = (!args.target.is_empty()).then(|| args.target.join(" "));
    let request = ReviewRequest::new(scope, target, args.paths, args.context)?;

    let mut options = ReviewOptions::new(domain, request);
    options.session = args.session;
    options.publish = !args.stdout;

    let vcs = GitRepo::new(root);
    let mut outcome = run_review(root, &vcs, &config, options)
        .with_context(|| format!("{} failed", domain.command()))?;
    let report_path = outcome
        .report_path()
        .map(|p| paths::display_relative(root, p));
    let publish_error = match outcome.published.take() {
        Some(Err(e)) => Some(e),
        _ => None,
    };
    let report = &outcome.report;

    if json {
        print_json(&serde_json::json!({
            "domain": domain,
            "recommendation": report.recommendation(),
            "summary_counts": report.summary_counts(),
            "findings": report.findings(),
            "files_reviewed": report.files_reviewed(),
            "rules_evaluated": report.rules_evaluated(),
            "session": report.session().map(|s| s.slug.as_str()),
            "report_path": report_path,
        }))?;
    } else if args.stdout {
        print!("{}", report.render_markdown());
    } else {
        if outcome.scope_empty {
            println!("No files in scope.");
        }
        print!("{}", report.console_summary());
        if let Some(path) = &report_path {
            println!("Report: {path}");
        }
    }

    match publish_error {
        Some(e) => Err(anyhow::Error::new(e).context(format!("{} failed", domain.command()))),
        None => Ok(()),
    }
}

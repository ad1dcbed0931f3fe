use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use review_core::{session::SessionRegistry, ReviewError};
use std::path::Path;

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// List sessions from .claude/README.md
    List,
    /// Show the session reviews are filed under by default
    Latest,
    /// Register a new session and create its directory
    Create { slug: String },
}

pub fn run(root: &Path, subcmd: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SessionSubcommand::List => list(root, json),
        SessionSubcommand::Latest => latest(root, json),
        SessionSubcommand::Create { slug } => create(root, &slug, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = match SessionRegistry::load(root) {
        Ok(r) => r,
        Err(ReviewError::NoSessionFound) => SessionRegistry::default(),
        Err(e) => return Err(e).context("failed to load session registry"),
    };

    if json {
        print_json(&registry.sessions())?;
        return Ok(());
    }

    if registry.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    let rows = registry
        .sessions()
        .iter()
        .map(|s| {
            vec![
                s.slug.clone(),
                s.created_at.format("%Y-%m-%d").to_string(),
                s.status.to_string(),
            ]
        })
        .collect();
    print_table(&["SESSION", "CREATED", "STATUS"], rows);
    Ok(())
}

fn latest(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = SessionRegistry::load(root).context("failed to load session registry")?;
    let session = registry.latest()?;

    if json {
        print_json(session)?;
    } else {
        println!("{}", session.slug);
    }
    Ok(())
}

fn create(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let session = SessionRegistry::create(root, slug)
        .with_context(|| format!("failed to create session '{slug}'"))?;

    if json {
        print_json(&session)?;
    } else {
        println!("Created session '{}'.", session.slug);
    }
    Ok(())
}

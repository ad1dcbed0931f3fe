mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, review::ReviewArgs, session::SessionSubcommand};
use review_core::types::Domain;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "review",
    about = "Session-scoped code review: resolve a scope, run a domain checklist, file the report",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .claude/ or .git/)
    #[arg(long, global = true, env = "REVIEW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review API contracts: removed endpoints, breaking fields, versioning
    ApiContracts(ReviewArgs),

    /// Review frontend performance: bundle weight, render cost, images
    FrontendPerformance(ReviewArgs),

    /// Review database migrations: locking, compatibility, rollback
    Migrations(ReviewArgs),

    /// Review release readiness: changelog, version, debug leftovers
    Release(ReviewArgs),

    /// Review reliability: timeouts, retries, swallowed errors
    Reliability(ReviewArgs),

    /// Review tests: coverage of changes, focused/skipped tests, flakiness
    Testing(ReviewArgs),

    /// Manage review sessions
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// List the checklist rules of a domain
    Rules {
        /// Domain name (e.g. migrations)
        domain: String,
    },

    /// Inspect and validate .claude/review.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::ApiContracts(args) => cmd::review::run(&root, Domain::ApiContracts, args, cli.json),
        Commands::FrontendPerformance(args) => {
            cmd::review::run(&root, Domain::FrontendPerformance, args, cli.json)
        }
        Commands::Migrations(args) => cmd::review::run(&root, Domain::Migrations, args, cli.json),
        Commands::Release(args) => cmd::review::run(&root, Domain::Release, args, cli.json),
        Commands::Reliability(args) => cmd::review::run(&root, Domain::Reliability, args, cli.json),
        Commands::Testing(args) => cmd::review::run(&root, Domain::Testing, args, cli.json),
        Commands::Session { subcommand } => cmd::session::run(&root, subcommand, cli.json),
        Commands::Rules { domain } => cmd::rules::run(&domain, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

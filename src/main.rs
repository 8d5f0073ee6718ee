//! herald - CLI entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use git2::Repository;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use herald::changelog::generate_summary;
use herald::config::{ReleaseConfig, load_config, load_config_from};
use herald::github::{GitHubHost, resolve_token};
use herald::ship::publish::{PublishReport, ReleaseHost};
use herald::ship::{Orchestrator, ReleaseOutcome, ReleaseSummary};
use herald::{PublishError, ReleaseError};

/// Cut a versioned release from conventional commits and publish it to GitHub.
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Cut a versioned release from conventional commits and publish it to GitHub")]
#[command(version)]
struct Cli {
    /// Path to the configuration file (defaults to herald.toml discovered from the repository)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path inside the repository to release
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Show the next version and release notes without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Retry publishing for the latest release tag only
    #[arg(long, conflicts_with = "dry_run")]
    resume: bool,

    /// Directory artifact patterns are resolved against
    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Stop after creating the release commit and tag
    #[arg(long)]
    no_publish: bool,

    /// Do not push the release commit and tag
    #[arg(long)]
    no_push: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<ReleaseError>()
                .map(ReleaseError::exit_code)
                .unwrap_or(1);
            eprintln!("Error: {:#}", e);
            ExitCode::from(code)
        }
    }
}

/// Set up logging/tracing.
fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_new("herald=debug,warn").unwrap_or_else(|_| EnvFilter::new("warn"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("herald=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let repo = Repository::discover(&cli.repo)
        .context("Not a git repository. Run herald from within a git repository.")?;
    let root = repo
        .workdir()
        .map(Path::to_path_buf)
        .context("Bare repositories are not supported")?;

    // Compare canonical paths so symlinked checkouts still stop at the root
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.clone());
    let start = cli.repo.canonicalize().unwrap_or_else(|_| canonical_root.clone());
    let mut config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(&start, &canonical_root),
    }
    .context("Failed to load configuration")?;

    if cli.no_push {
        config.push = false;
    }

    let host = if cli.no_publish || cli.dry_run {
        None
    } else {
        Some(build_host(&repo, &config).context("GitHub release host is required for publishing")?)
    };

    let changelog_name = config.changelog.display().to_string();
    let mut orchestrator = Orchestrator::new(repo, config).dry_run(cli.dry_run);
    if let Some(dir) = cli.build_dir {
        let dir = std::env::current_dir()
            .context("Failed to read current directory")?
            .join(dir);
        orchestrator = orchestrator.build_dir(dir);
    }
    if let Some(host) = host {
        orchestrator = orchestrator.with_host(host);
    }

    let outcome = if cli.resume {
        orchestrator.resume().await?
    } else {
        orchestrator.run().await?
    };

    print_outcome(&outcome, &changelog_name);
    Ok(())
}

/// Build the GitHub host from the configured URL or the push remote.
fn build_host(repo: &Repository, config: &ReleaseConfig) -> Result<Arc<dyn ReleaseHost>> {
    let url = match &config.repository_url {
        Some(url) => url.clone(),
        None => {
            let remote = repo
                .find_remote(&config.remote)
                .with_context(|| format!("No '{}' remote found", config.remote))?;
            remote
                .url()
                .map(String::from)
                .ok_or_else(|| PublishError::InvalidRepositoryUrl(config.remote.clone()))?
        }
    };

    let token = resolve_token()?;
    let host = GitHubHost::from_url(&token, &url)?;
    tracing::debug!(repo = %host.slug(), "Publishing to GitHub");
    Ok(Arc::new(host))
}

fn print_outcome(outcome: &ReleaseOutcome, changelog_name: &str) {
    match outcome {
        ReleaseOutcome::NoOp { reason, decision } => {
            println!(
                "Nothing to release: {} (current version {})",
                reason, decision.previous
            );
        }
        ReleaseOutcome::DryRun(summary) => {
            print_decision(summary);
            println!("\n--- Dry Run Output ---\n");
            print!("{}", summary.section);
            println!("Dry run complete. No changes made.");
        }
        ReleaseOutcome::Released(summary) => {
            print_decision(summary);
            if let Some(written) = &summary.written {
                if written.changelog_written {
                    println!("  [DONE] {}", generate_summary(&summary.notes, changelog_name));
                }
                for file in &written.files {
                    println!("  [DONE] Staged {}", file.display());
                }
                if written.commit_created {
                    println!("  [DONE] Created release commit");
                } else {
                    println!("  [SKIP] No changes to commit; tagged current HEAD");
                }
                println!("  [DONE] Created tag: {}", summary.tag);
                if written.pushed {
                    println!("  [DONE] Pushed");
                }
            }
            match &summary.published {
                Some(report) => print_report(report),
                None => println!("  [SKIP] Publishing"),
            }
            println!();
            println!("Release {} shipped!", summary.tag);
        }
        ReleaseOutcome::Resumed { tag, report, .. } => {
            print_report(report);
            println!();
            println!("Release {} published.", tag);
        }
    }
}

fn print_decision(summary: &ReleaseSummary) {
    let decision = &summary.decision;
    println!(
        "Version: {} -> {} ({} bump, {} commits)",
        decision.previous, decision.next, decision.bump, summary.commit_count
    );
}

fn print_report(report: &PublishReport) {
    println!(
        "  [DONE] Published {} ({} uploaded, {} already present)",
        report.release.html_url.as_deref().unwrap_or(&report.release.tag),
        report.uploaded.len(),
        report.skipped.len()
    );
}

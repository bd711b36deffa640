//! docrawl main entry point
//!
//! This is the command-line interface for the docrawl documentation crawler.

use anyhow::{bail, Context};
use clap::Parser;
use docrawl::config::{load_config_with_hash, Config};
use docrawl::output::{format_stored, load_statistics, print_report};
use docrawl::crawler::locate_output_dir;
use docrawl::run_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// docrawl: a resumable documentation corpus crawler
///
/// docrawl crawls documentation sites breadth-first, converts each page to
/// Markdown, and re-crawls only what changed. Interrupted crawls resume
/// where they stopped.
#[derive(Parser, Debug)]
#[command(name = "docrawl")]
#[command(version)]
#[command(about = "A resumable documentation corpus crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl only the named target (repeatable); all targets by default
    #[arg(short, long = "target", value_name = "NAME")]
    targets: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start fresh, ignoring interrupted sessions
    #[arg(long)]
    fresh: bool,

    /// Rewrite every page even when its content is unchanged
    #[arg(long)]
    force: bool,

    /// Show statistics recorded by previous runs and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    select_targets(&mut config, &cli.targets)?;

    if cli.stats {
        handle_stats(&config).await;
        return Ok(());
    }

    if cli.fresh {
        config.crawler.resume = false;
        tracing::info!("Starting fresh crawl (ignoring interrupted sessions)");
    }
    if cli.force {
        config.crawler.force_recrawl = true;
    }

    let code = handle_crawl(config).await;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docrawl=info,warn"),
            1 => EnvFilter::new("docrawl=debug,info"),
            2 => EnvFilter::new("docrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Keeps only the targets named on the command line
fn select_targets(config: &mut Config, names: &[String]) -> anyhow::Result<()> {
    if names.is_empty() {
        return Ok(());
    }

    for name in names {
        if config.target(name).is_none() {
            bail!("no target named '{}' in configuration", name);
        }
    }

    config.targets.retain(|t| names.contains(&t.name));
    Ok(())
}

/// Handles the --stats mode: prints each target's stored ledger
///
/// Directories are resolved like a crawl resolves them, so an interrupted
/// session under a search root is found. A completed run that resumed from
/// a search root keeps its ledger there and is not listed here.
async fn handle_stats(config: &Config) {
    for target in &config.targets {
        let dir = locate_output_dir(config, target).await;

        match load_statistics(dir.as_path()).await {
            Some(summary) => println!("{}", format_stored(&target.name, &summary)),
            None => println!("=== {} ===\n  No crawl data in {}\n", target.name, dir),
        }
    }
}

/// Runs every selected target and returns the process exit code
async fn handle_crawl(config: Config) -> i32 {
    tracing::info!("Crawling {} target(s)", config.targets.len());

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, checkpointing and stopping");
            signal.cancel();
        }
    });

    let report = run_all(Arc::new(config), cancel).await;
    print_report(&report);

    if report.is_success() {
        tracing::info!("Crawl completed successfully");
    } else {
        tracing::error!("{} sub-run(s) failed", report.failures().len());
    }
    report.exit_code()
}

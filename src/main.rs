//! Docket-Harvest main entry point
//!
//! This is the command-line interface for the Docket-Harvest document pipeline.

use clap::Parser;
use docket_harvest::config::{load_config_with_hash, restrict_sources, validate, Config};
use docket_harvest::harvest::{harvest, Pipeline, RunReport, RunStatus};
use docket_harvest::index::read_index;
use docket_harvest::output::{print_statistics, Statistics};
use docket_harvest::storage::RunLayout;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Docket-Harvest: a resumable court document harvester
///
/// Docket-Harvest enumerates public document collections, retrieves every
/// document exactly once, extracts searchable text and assembles a single
/// JSON index with statistics and failure reports.
#[derive(Parser, Debug)]
#[command(name = "docket-harvest")]
#[command(version)]
#[command(about = "A resumable court document harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the run directory from the configuration
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Only harvest the given source id (repeatable)
    #[arg(short, long = "source", value_name = "ID")]
    sources: Vec<String>,

    /// Validate config and show what would be harvested without any network activity
    #[arg(long, conflicts_with_all = ["index_only", "stats"])]
    dry_run: bool,

    /// Rebuild the index and reports from the existing ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    index_only: bool,

    /// Show statistics of the existing index and exit
    #[arg(long, conflicts_with_all = ["dry_run", "index_only"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(dir) = &cli.output {
        config.output.directory = dir.display().to_string();
    }
    restrict_sources(&mut config, &cli.sources)?;
    validate(&config)?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.index_only {
        handle_index_only(config, config_hash).await?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docket_harvest=info,warn"),
            1 => EnvFilter::new("docket_harvest=debug,info"),
            2 => EnvFilter::new("docket_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    let layout = RunLayout::from_config(&config.output);

    println!("=== Docket-Harvest Dry Run ===\n");

    println!("Harvester Configuration:");
    println!("  Page delay: {}ms", config.harvester.page_delay_ms);
    println!("  Fetch delay: {}ms", config.harvester.fetch_delay_ms);
    println!("  Max retries: {}", config.harvester.max_retries);
    println!(
        "  Max concurrent fetches: {}",
        config.harvester.max_concurrent_fetches
    );
    println!("  Request timeout: {}s", config.harvester.request_timeout_secs);
    println!("  On challenge: {:?}", config.harvester.on_challenge);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Run directory: {}", layout.root().display());
    println!("  Ledger: {}", layout.ledger_path().display());
    println!("  Index: {}", layout.index_path().display());

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} [{:?}] {}", source.id, source.kind, source.label);
        if let Some(docket_id) = source.docket_id {
            println!("    docket {}", docket_id);
        }
        if let Some(search) = &source.search {
            println!("    search \"{}\"", search);
        }
        if let Some(listing) = &source.listing_url {
            println!("    listing {}", listing);
        }
        for url in &source.urls {
            println!("    * {}", url);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics of the existing index
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let layout = RunLayout::from_config(&config.output);
    println!("Index: {}\n", layout.index_path().display());

    let index = read_index(layout.index_path())?;
    let failed = count_logged_failures(&layout.failure_log_path());

    print_statistics(&Statistics::from_index(&index, failed));

    Ok(())
}

/// Number of entries in an existing failure log, zero when there is none
fn count_logged_failures(path: &Path) -> usize {
    match std::fs::read_to_string(path) {
        Ok(log) => log
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .count(),
        Err(_) => 0,
    }
}

/// Handles the --index-only mode: rebuilds the index from the ledger
async fn handle_index_only(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(config, config_hash)?;

    match pipeline.build_index(&[]).await {
        Ok(summary) => {
            print_statistics(&summary.statistics);
            println!(
                "\n✓ Index written to: {}",
                pipeline.layout().index_path().display()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Index build failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Sources: {}, max concurrent fetches: {}",
        config.sources.len(),
        config.harvester.max_concurrent_fetches
    );

    match harvest(config, config_hash).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_report(report: &RunReport) {
    if let Some(index) = &report.index {
        print_statistics(&index.statistics);
        println!();
    }

    println!("Downloaded: {}", report.downloaded);
    println!("Skipped (already retrieved): {}", report.skipped);
    println!("Failed: {}", report.failed.len());
    println!("Source failures: {}", report.source_failures.len());
    for failure in &report.source_failures {
        println!("  - {}: {}", failure.source_id, failure.message);
    }

    match report.status {
        RunStatus::Completed => println!("\n✓ Harvest completed"),
        RunStatus::Interrupted => {
            println!("\nHarvest interrupted, ledger saved. Run again to resume.")
        }
        RunStatus::Aborted => println!("\nHarvest aborted, ledger saved. Run again to resume."),
    }
}

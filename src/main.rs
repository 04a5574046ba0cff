//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest listing harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_harvest::config::{load_config_with_hash, validate, Config};
use sumi_harvest::output::{print_statistics, save_records_json, write_records_json, CrawlStatistics};
use sumi_harvest::{Coordinator, HarvestService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a forgiving marketplace listing harvester
///
/// Sumi-Harvest walks search result pages through a fetch proxy, collects
/// product links, and extracts name, price and description for each product
/// using an inference service with a markup heuristic fallback.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A forgiving marketplace listing harvester", long_about = None)]
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

    /// Override the first search results page
    #[arg(long, value_name = "URL")]
    start_url: Option<String>,

    /// Override the search page budget
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Write records as JSON to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(start_url) = cli.start_url {
        config.crawler.start_url = start_url;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(output) = &cli.output {
        config.output.results_path = Some(output.display().to_string());
    }
    validate(&config).context("Invalid command-line override")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_harvest(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawl:");
    println!("  Start URL: {}", config.crawler.start_url);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Site base: {}", config.crawler.site_base_url);
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);
    println!("  Item delay: {}ms", config.crawler.item_delay_ms);
    println!("  Concurrent items: {}", config.crawler.max_concurrent_items);
    println!("  Product links per page: {}", config.crawler.product_url_cap);

    println!("\nFetch proxy:");
    println!("  Endpoint: {}", config.proxy.endpoint);
    println!("  Attempts: {}", config.proxy.max_attempts);
    println!("  Timeout: {}s", config.proxy.timeout_secs);

    println!("\nInference:");
    if config.inference.api_key.is_some() {
        println!("  Endpoint: {}", config.inference.endpoint);
        println!("  Model: {}", config.inference.model);
    } else {
        println!("  Not configured, heuristics only");
    }

    println!("\nOutput:");
    match &config.output.results_path {
        Some(path) => println!("  Records: {}", path),
        None => println!("  Records: stdout"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(&config).context("Failed to build crawler")?;
    let service = HarvestService::new(coordinator);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing with what has been collected");
                cancel.cancel();
            }
        });
    }

    let report = service
        .scrape(
            &config.crawler.start_url,
            config.crawler.max_pages,
            cancel,
        )
        .await?;

    let stats = CrawlStatistics::from_result(&report.crawl);

    // Records own stdout when no file is given
    match &config.output.results_path {
        Some(path) => {
            save_records_json(&report.products, Path::new(path))?;
            print_statistics(&stats);
        }
        None => {
            write_records_json(&report.products, std::io::stdout().lock())?;
            tracing::info!(
                "{} of {} products named ({:.1}%)",
                stats.named,
                stats.attempted,
                stats.success_rate()
            );
        }
    }

    Ok(())
}

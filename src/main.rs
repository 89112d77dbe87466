//! Static-Mirror main entry point
//!
//! This is the command-line interface for the Static-Mirror site mirror.

use clap::Parser;
use static_mirror::config::{load_config, MirrorConfig};
use static_mirror::crawler::{generate_pages, mirror, user_agent_string, PageOutcome, StopSignal};
use static_mirror::output::print_report;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Static-Mirror: a static mirror generator for dynamically rendered sites
///
/// Static-Mirror fetches every page of a configured site, stores the
/// resources it references under content-addressed names and rewrites the
/// markup so the output directory can be served as plain files.
#[derive(Parser, Debug)]
#[command(name = "static-mirror")]
#[command(version)]
#[command(about = "A static mirror generator for dynamically rendered sites", long_about = None)]
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

    /// Only mirror the named site (repeatable)
    #[arg(long = "site", value_name = "NAME")]
    sites: Vec<String>,

    /// Generate only this page instead of a full crawl (repeatable)
    #[arg(long = "page", value_name = "PATH")]
    pages: Vec<String>,

    /// Validate config and show what would be mirrored without fetching anything
    #[arg(long, conflicts_with = "pages")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(config) => {
            tracing::info!(
                "Configuration loaded: {} sites enabled, {} disabled",
                config.sites.len(),
                config.disabled.len()
            );
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let stop = StopSignal::new();
    let signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Stop requested, finishing pages in progress");
            signal.stop();
        }
    });

    if cli.pages.is_empty() {
        handle_mirror(&config, &cli.sites, &stop).await
    } else {
        handle_pages(&config, &cli.sites, &cli.pages, &stop).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("static_mirror=info,warn"),
            1 => EnvFilter::new("static_mirror=debug,info"),
            2 => EnvFilter::new("static_mirror=trace,debug"),
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
fn handle_dry_run(config: &MirrorConfig) {
    println!("=== Static-Mirror Dry Run ===\n");

    println!("User Agent:");
    println!("  {}", user_agent_string(&config.user_agent));

    println!("\nResource Types ({}):", config.catalog.rules().len());
    for rule in config.catalog.rules() {
        let extension = if rule.extension.is_empty() {
            "(none)"
        } else {
            rule.extension.as_str()
        };
        println!(
            "  - {} {} [hash: {}, original path: {}, resource folder: {}]",
            extension,
            rule.mime_type,
            rule.use_hash,
            rule.use_original_path,
            rule.use_resource_folder
        );
    }

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({})", site.name, site.origin_url);
        println!("    Output: {}", site.output_path.display());
        println!("    Resources: {}", site.resource_path().display());
        println!(
            "    Workers: {}, order: {:?}, pages: {}",
            site.max_parallelism,
            site.crawl_order,
            site.page.len()
        );
    }

    if !config.disabled.is_empty() {
        println!("\nDisabled Sites ({}):", config.disabled.len());
        for disabled in &config.disabled {
            println!("  - {}: {}", disabled.name, disabled.reason);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main mirror operation
async fn handle_mirror(
    config: &MirrorConfig,
    sites: &[String],
    stop: &StopSignal,
) -> Result<(), Box<dyn std::error::Error>> {
    let reports = match mirror(config, sites, stop).await {
        Ok(reports) => reports,
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            return Err(e.into());
        }
    };

    for report in &reports {
        print_report(report);
        println!();
    }

    Ok(())
}

/// Handles the --page mode: generates the given pages of each selected site
async fn handle_pages(
    config: &MirrorConfig,
    sites: &[String],
    pages: &[String],
    stop: &StopSignal,
) -> Result<(), Box<dyn std::error::Error>> {
    let results = match generate_pages(config, sites, pages, stop).await {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("Page generation failed: {}", e);
            return Err(e.into());
        }
    };

    for (site, outcomes) in &results {
        println!("=== {} ===", site);
        for (path, outcome) in pages.iter().zip(outcomes) {
            match outcome {
                PageOutcome::Written { paths, resources } => {
                    println!("  {} -> {} files, {} resources", path, paths.len(), resources)
                }
                PageOutcome::FetchFailed { reason } => println!("  {} failed: {}", path, reason),
                PageOutcome::Cancelled { stage, reason } => {
                    println!("  {} cancelled at {}: {}", path, stage, reason)
                }
                PageOutcome::Skipped { removed } => {
                    println!("  {} skipped ({} documents removed)", path, removed)
                }
            }
        }
    }

    Ok(())
}

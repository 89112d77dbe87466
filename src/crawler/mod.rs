//! Crawler module for site mirroring
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching of pages and resources
//! - The page writer and its lifecycle checkpoints
//! - Work queue ordering and the stop signal
//! - Overall crawl coordination and output reconciliation

mod coordinator;
mod fetcher;
mod page;
mod reconcile;
mod scheduler;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, fetch_url, user_agent_string, FetchResult};
pub use page::{fix_permalinks, Flow, PageObserver, PageOutcome, PageWriter, Stage};
pub use reconcile::{
    create_redirect_pages, remove_generated_page, remove_obsolete_pages, remove_obsolete_resources,
};
pub use scheduler::{StopSignal, Worklist};

use crate::catalog::ResourceTypeCatalog;
use crate::config::{MirrorConfig, SiteConfig};
use crate::output::CrawlReport;
use crate::site::StaticContentTree;
use crate::Result;
use reqwest::Client;
use std::sync::Arc;

/// Runs a full crawl of every enabled site
///
/// This is the main entry point for mirroring. For each site it will:
/// 1. Build the content tree from the site's page list
/// 2. Create a coordinator (loading the route table if used)
/// 3. Generate every page and sweep obsolete output
///
/// A site that fails to start is logged and skipped; the remaining sites
/// still run. Sites not yet started are skipped once `stop` is set.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `only` - Site names to mirror; empty mirrors all sites
/// * `stop` - Stop signal shared with the caller
///
/// # Returns
///
/// * `Ok(Vec<CrawlReport>)` - One report per site that ran
/// * `Err(MirrorError)` - The HTTP client could not be built
pub async fn mirror(
    config: &MirrorConfig,
    only: &[String],
    stop: &StopSignal,
) -> Result<Vec<CrawlReport>> {
    let client = build_http_client(&config.user_agent)?;
    let catalog = Arc::new(config.catalog.clone());
    let mut reports = Vec::new();

    for site in &config.sites {
        if !only.is_empty() && !only.contains(&site.name) {
            continue;
        }

        if stop.is_stopped() {
            tracing::info!("Stop requested, not starting site '{}'", site.name);
            break;
        }

        let Some(coordinator) = start_site(site, &catalog, &client, stop) else {
            continue;
        };

        match coordinator.run_full_crawl().await {
            Ok(report) => reports.push(report),
            Err(e) => tracing::error!("Mirror of '{}' failed: {}", site.name, e),
        }
    }

    Ok(reports)
}

/// Generates the given pages of every selected site
///
/// Sites are selected the same way as for [`mirror`], and a site that fails
/// to start is logged and skipped. Routes are saved after each site.
///
/// # Returns
///
/// * `Ok(Vec<(String, Vec<PageOutcome>)>)` - Site name and one outcome per
///   requested path, for every site that ran
/// * `Err(MirrorError)` - The HTTP client could not be built
pub async fn generate_pages(
    config: &MirrorConfig,
    only: &[String],
    paths: &[String],
    stop: &StopSignal,
) -> Result<Vec<(String, Vec<PageOutcome>)>> {
    let client = build_http_client(&config.user_agent)?;
    let catalog = Arc::new(config.catalog.clone());
    let mut results = Vec::new();

    for site in &config.sites {
        if !only.is_empty() && !only.contains(&site.name) {
            continue;
        }

        let Some(coordinator) = start_site(site, &catalog, &client, stop) else {
            continue;
        };

        let outcomes = match coordinator.generate_paths(paths).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!("Page generation for '{}' failed: {}", site.name, e);
                continue;
            }
        };
        if let Err(e) = coordinator.save_routes() {
            tracing::error!("Failed to save routes of '{}': {}", site.name, e);
        }

        results.push((site.name.clone(), outcomes));
    }

    Ok(results)
}

fn start_site(
    site: &SiteConfig,
    catalog: &Arc<ResourceTypeCatalog>,
    client: &Client,
    stop: &StopSignal,
) -> Option<Coordinator> {
    let tree = Arc::new(StaticContentTree::from_site(site));
    match Coordinator::new(
        site.clone(),
        catalog.clone(),
        client.clone(),
        tree,
        stop.clone(),
    ) {
        Ok(coordinator) => Some(coordinator),
        Err(e) => {
            tracing::error!("Failed to start site '{}': {}", site.name, e);
            None
        }
    }
}

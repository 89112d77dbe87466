//! Crawl coordinator - site mirroring orchestration
//!
//! This module drives the generation of a site's pages, including:
//! - Building the work queue from the content tree
//! - Running page generations on a bounded worker pool
//! - Honoring the stop signal between generations
//! - Sweeping obsolete pages and resources after a full crawl
//! - Incremental regeneration on content lifecycle events

use crate::catalog::ResourceTypeCatalog;
use crate::config::SiteConfig;
use crate::crawler::page::{PageObserver, PageOutcome, PageWriter};
use crate::crawler::reconcile;
use crate::crawler::scheduler::{StopSignal, Worklist};
use crate::output::CrawlReport;
use crate::resource::{CrawlResourceMap, ResolutionEngine};
use crate::site::{ContentEvent, ContentTree, NullRegistrar, PageEntry, RouteRegistrar, RouteTable};
use crate::url::{ensure_page_path, to_site_relative};
use crate::Result;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Mirror coordinator of one site
pub struct Coordinator {
    site: Arc<SiteConfig>,
    tree: Arc<dyn ContentTree>,
    writer: PageWriter,
    routes: Arc<dyn RouteRegistrar>,
    route_table: Option<Arc<RouteTable>>,
    leaf_names: Arc<Vec<String>>,
    stop: StopSignal,
}

impl Coordinator {
    /// Creates a coordinator for a validated site
    ///
    /// # Arguments
    ///
    /// * `site` - The site configuration
    /// * `catalog` - Resource type catalog shared by all sites
    /// * `client` - HTTP client carrying the mirror's user agent
    /// * `tree` - Content tree the pages are enumerated from
    /// * `stop` - Stop signal observed between page generations
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to generate pages
    /// * `Err(MirrorError)` - The origin is invalid or the route table
    ///   could not be loaded
    pub fn new(
        site: SiteConfig,
        catalog: Arc<ResourceTypeCatalog>,
        client: Client,
        tree: Arc<dyn ContentTree>,
        stop: StopSignal,
    ) -> Result<Self> {
        let site = Arc::new(site);
        let leaf_names = Arc::new(catalog.leaf_document_names());
        let engine = Arc::new(ResolutionEngine::new(site.clone(), catalog, client)?);

        let route_table = if site.use_routing {
            let table = RouteTable::load(&site.routes_path(), &site.output_path, leaf_names.as_slice())?;
            tracing::info!("Loaded {} routes for '{}'", table.len(), site.name);
            Some(Arc::new(table))
        } else {
            None
        };

        let routes: Arc<dyn RouteRegistrar> = match &route_table {
            Some(table) => table.clone() as Arc<dyn RouteRegistrar>,
            None => Arc::new(NullRegistrar),
        };

        let writer = PageWriter::new(engine, tree.clone(), routes.clone(), leaf_names.clone());

        Ok(Self {
            site,
            tree,
            writer,
            routes,
            route_table,
            leaf_names,
            stop,
        })
    }

    /// Adds a lifecycle observer to every page generation
    pub fn with_observer(mut self, observer: Arc<dyn PageObserver>) -> Self {
        self.writer = self.writer.with_observer(observer);
        self
    }

    /// Returns the site configuration
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Returns the route table when the site uses routing
    pub fn route_table(&self) -> Option<&RouteTable> {
        self.route_table.as_deref()
    }

    /// Generates one page against a shared crawl map
    pub async fn generate_page(
        &self,
        page: &PageEntry,
        crawl: Arc<CrawlResourceMap>,
    ) -> Result<PageOutcome> {
        self.writer.generate(page, crawl).await
    }

    /// Runs a full crawl of the site
    ///
    /// This is the core mirroring logic that:
    /// 1. Lists the pages below the start page and orders the work queue
    /// 2. Generates the first page alone
    /// 3. Generates the rest on `max-parallelism` workers sharing one
    ///    crawl map, checking the stop signal before each page
    /// 4. Saves the route table
    /// 5. Sweeps obsolete pages and resources, unless stopped early
    pub async fn run_full_crawl(&self) -> Result<CrawlReport> {
        let mut report = CrawlReport::new(&self.site.name);
        let crawl = Arc::new(CrawlResourceMap::new());

        let entries = self.tree.list_pages(&self.site.start_page, &self.stop);
        let worklist = Worklist::new(entries, self.site.crawl_order);
        report.pages_found = worklist.len();

        tracing::info!(
            "Mirroring {} pages of '{}' with {} workers",
            report.pages_found,
            self.site.name,
            self.site.max_parallelism
        );

        if let Some((first, rest)) = worklist.split_first() {
            if !self.stop.is_stopped() {
                let result = self.writer.generate(&first, crawl.clone()).await;
                record_result(&mut report, &first.path, result);
            }

            self.run_pool(rest, &crawl, &mut report).await;
        }

        self.save_routes()?;
        report.resources_resolved = crawl.rewritten_urls().len();

        if self.stop.is_stopped() {
            tracing::info!("Stop requested, skipping obsolete content sweeps");
            report.stopped = true;
        } else {
            if self.site.remove_obsolete_pages {
                report.obsolete_pages_removed = reconcile::remove_obsolete_pages(
                    &self.site,
                    &self.leaf_names,
                    self.tree.as_ref(),
                    self.routes.as_ref(),
                );
                self.save_routes()?;
            }

            if self.site.remove_obsolete_resources {
                report.obsolete_resources_removed = reconcile::remove_obsolete_resources(
                    &self.site,
                    &self.leaf_names,
                    &crawl.rewritten_urls(),
                );
            }
        }

        report.finish();
        tracing::info!(
            "Mirror of '{}' finished: {} generated, {} failed, {} cancelled, {} skipped",
            self.site.name,
            report.pages_generated,
            report.pages_failed,
            report.pages_cancelled,
            report.pages_skipped
        );

        Ok(report)
    }

    /// Generates `pages` on the bounded worker pool
    async fn run_pool(
        &self,
        pages: Vec<PageEntry>,
        crawl: &Arc<CrawlResourceMap>,
        report: &mut CrawlReport,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.site.max_parallelism.max(1)));
        let mut tasks: JoinSet<(String, Result<PageOutcome>)> = JoinSet::new();

        for page in pages {
            if self.stop.is_stopped() {
                tracing::info!("Stop requested, not starting remaining pages");
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // The stop may have arrived while waiting for a worker
            if self.stop.is_stopped() {
                break;
            }

            let writer = self.writer.clone();
            let crawl = crawl.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = writer.generate(&page, crawl).await;
                (page.path, result)
            });

            while let Some(joined) = tasks.try_join_next() {
                record_joined(report, joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record_joined(report, joined);
        }
    }

    /// Regenerates every page that references a content item
    ///
    /// All language versions of each dependent page are regenerated.
    pub async fn generate_pages_depending_on(&self, id: &str) -> Result<Vec<PageOutcome>> {
        let pages = self.tree.pages_depending_on(id);
        tracing::info!("Regenerating {} pages depending on {}", pages.len(), id);
        self.generate_entries(&pages).await
    }

    /// Generates the pages at `paths`
    ///
    /// Paths the content tree does not list are generated as plain pages
    /// without a language or simple address.
    pub async fn generate_paths(&self, paths: &[String]) -> Result<Vec<PageOutcome>> {
        let pages: Vec<PageEntry> = paths.iter().map(|path| self.entry_for(path)).collect();
        self.generate_entries(&pages).await
    }

    /// Removes the generated output of a page
    pub fn remove_generated_page(&self, path: &str, remove_subfolders: bool) -> usize {
        reconcile::remove_generated_page(
            &self.site,
            &self.leaf_names,
            self.routes.as_ref(),
            path,
            remove_subfolders,
        )
    }

    /// Replaces the output below `old_path` with redirects to `new_path`
    pub fn create_redirect_pages(&self, old_path: &str, new_path: &str) -> usize {
        reconcile::create_redirect_pages(&self.site, &self.leaf_names, old_path, new_path)
    }

    /// Applies a content lifecycle event to the mirror
    ///
    /// | Event            | Effect                                                  |
    /// |------------------|---------------------------------------------------------|
    /// | `Published`      | generate the page                                       |
    /// | `Moved`          | redirect stubs at the old path, generate the new subtree |
    /// | `Deleted`        | remove the page and its subtree                         |
    /// | `ContentChanged` | regenerate the dependent pages                          |
    pub async fn handle_event(&self, event: ContentEvent) -> Result<()> {
        tracing::debug!("Handling {:?} for '{}'", event, self.site.name);

        match event {
            ContentEvent::Published { path } => {
                let Some(path) = event_path(&path) else {
                    return Ok(());
                };
                self.generate_paths(&[path]).await?;
            }
            ContentEvent::Moved { old_path, new_path } => {
                let (Some(old_path), Some(new_path)) = (event_path(&old_path), event_path(&new_path))
                else {
                    return Ok(());
                };
                self.create_redirect_pages(&old_path, &new_path);
                self.routes.unregister(&old_path, true);
                let pages = self.tree.list_pages(&new_path, &self.stop);
                self.generate_entries(&pages).await?;
            }
            ContentEvent::Deleted { path } => {
                let Some(path) = event_path(&path) else {
                    return Ok(());
                };
                let removed = self.remove_generated_page(&path, true);
                tracing::info!("Removed {} documents below {}", removed, path);
            }
            ContentEvent::ContentChanged { id } => {
                self.generate_pages_depending_on(&id).await?;
            }
        }

        self.save_routes()
    }

    /// Persists the route table when the site uses routing
    pub fn save_routes(&self) -> Result<()> {
        match &self.route_table {
            Some(table) => table.save(&self.site.routes_path()),
            None => Ok(()),
        }
    }

    /// Generates pages one after another with a shared crawl map
    async fn generate_entries(&self, pages: &[PageEntry]) -> Result<Vec<PageOutcome>> {
        let crawl = Arc::new(CrawlResourceMap::new());
        let mut outcomes = Vec::with_capacity(pages.len());

        for page in pages {
            if self.stop.is_stopped() {
                tracing::info!("Stop requested, not generating remaining pages");
                break;
            }
            outcomes.push(self.writer.generate(page, crawl.clone()).await?);
        }

        Ok(outcomes)
    }

    fn entry_for(&self, path: &str) -> PageEntry {
        let path = ensure_page_path(path);
        self.tree
            .list_pages(&path, &self.stop)
            .into_iter()
            .find(|entry| entry.path == path)
            .unwrap_or_else(|| PageEntry {
                id: path.clone(),
                path,
                language: None,
                simple_address: None,
            })
    }
}

/// Normalizes a page path handed over with a lifecycle event
///
/// Absolute URLs are reduced to their path; protocol-relative ones are
/// ignored.
fn event_path(path: &str) -> Option<String> {
    match to_site_relative(path) {
        Some(relative) => Some(ensure_page_path(&relative)),
        None => {
            tracing::warn!("Ignoring event for unusable page path '{}'", path);
            None
        }
    }
}

fn record_result(report: &mut CrawlReport, path: &str, result: Result<PageOutcome>) {
    match result {
        Ok(outcome) => report.record(path, &outcome),
        Err(e) => {
            tracing::error!("Error generating {}: {}", path, e);
            report.record_error(path, &e.to_string());
        }
    }

    let processed = report.pages_processed();
    if processed % 10 == 0 {
        tracing::info!(
            "Progress: {} / {} pages processed",
            processed,
            report.pages_found
        );
    }
}

fn record_joined(
    report: &mut CrawlReport,
    joined: std::result::Result<(String, Result<PageOutcome>), tokio::task::JoinError>,
) {
    match joined {
        Ok((path, result)) => record_result(report, &path, result),
        Err(e) => {
            tracing::error!("Page worker failed: {}", e);
            report.record_error("<worker>", &e.to_string());
        }
    }
}

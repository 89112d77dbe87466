//! Page mirror writer
//!
//! Generates one page: fetch, permalink fixup, resource rewriting, write of
//! the canonical document and its simple-address alias, route registration.
//! Registered [`PageObserver`]s are notified at four checkpoints and may
//! cancel the remaining steps of that page.

use crate::catalog::{DependencyLookup, DEFAULT_NAME};
use crate::crawler::reconcile::remove_generated_page;
use crate::crawler::{fetch_url, FetchResult};
use crate::resource::{write_file, CrawlResourceMap, PageContext, ResolutionEngine};
use crate::rewrite::rewrite_dependencies;
use crate::site::{ContentTree, GeneratePolicy, PageEntry, RouteRegistrar};
use crate::url::{ensure_page_path, url_to_path};
use crate::Result;
use regex::{Captures, Regex};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

static PERMALINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<attr>\b(?:href|src)\s*=\s*["'])/link/(?P<id>[0-9a-fA-F]{32})\.aspx"#)
        .unwrap()
});

/// Checkpoint of a page generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BeforeFetch,
    AfterFetch,
    BeforeWrite,
    AfterWrite,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BeforeFetch => "before-fetch",
            Stage::AfterFetch => "after-fetch",
            Stage::BeforeWrite => "before-write",
            Stage::AfterWrite => "after-write",
        };
        f.write_str(name)
    }
}

/// Decision of an observer at a checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancel(String),
}

/// Lifecycle hooks around a page generation
///
/// Every hook defaults to [`Flow::Continue`]. Returning [`Flow::Cancel`]
/// skips the remaining steps for that page only.
pub trait PageObserver: Send + Sync {
    fn before_fetch(&self, _page: &PageEntry) -> Flow {
        Flow::Continue
    }

    /// Called with the fetched markup before any rewriting
    fn after_fetch(&self, _page: &PageEntry, _content: &mut String) -> Flow {
        Flow::Continue
    }

    /// Called with the rewritten markup and the files about to be written
    fn before_write(&self, _page: &PageEntry, _content: &mut String, _paths: &mut Vec<PathBuf>) -> Flow {
        Flow::Continue
    }

    /// Called after the files were written, before route registration
    fn after_write(&self, _page: &PageEntry, _paths: &[PathBuf]) -> Flow {
        Flow::Continue
    }
}

/// Result of one page generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was written to `paths`, referencing `resources` mirrored resources
    Written { paths: Vec<PathBuf>, resources: usize },

    /// The page could not be fetched; nothing was written
    FetchFailed { reason: String },

    /// An observer cancelled the generation
    Cancelled { stage: Stage, reason: String },

    /// The content tree excluded the page; `removed` earlier documents were deleted
    Skipped { removed: usize },
}

/// File name and rewriters of a page document
struct DocumentType {
    file_name: String,
    lookups: Vec<DependencyLookup>,
}

/// Generates page documents of one site
#[derive(Clone)]
pub struct PageWriter {
    engine: Arc<ResolutionEngine>,
    tree: Arc<dyn ContentTree>,
    routes: Arc<dyn RouteRegistrar>,
    leaf_names: Arc<Vec<String>>,
    observers: Vec<Arc<dyn PageObserver>>,
}

impl PageWriter {
    pub fn new(
        engine: Arc<ResolutionEngine>,
        tree: Arc<dyn ContentTree>,
        routes: Arc<dyn RouteRegistrar>,
        leaf_names: Arc<Vec<String>>,
    ) -> Self {
        Self {
            engine,
            tree,
            routes,
            leaf_names,
            observers: Vec::new(),
        }
    }

    /// Adds an observer notified at every checkpoint
    pub fn with_observer(mut self, observer: Arc<dyn PageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Generates one page
    ///
    /// # Process
    ///
    /// 1. Apply the content tree's generation policy
    /// 2. Fetch the page; a failure ends here without touching the output
    /// 3. Replace permalinks with page paths
    /// 4. Resolve and rewrite resource references through `crawl`
    /// 5. Write the canonical document and the simple-address alias
    /// 6. Register the routes when the site uses routing
    ///
    /// # Errors
    ///
    /// Only a failure to write the page document is an error.
    pub async fn generate(&self, page: &PageEntry, crawl: Arc<CrawlResourceMap>) -> Result<PageOutcome> {
        let site = self.engine.site();

        match self.tree.generate_policy(&page.path) {
            GeneratePolicy::Generate => {}
            GeneratePolicy::Skip => {
                tracing::debug!("Skipping {} per content policy", page.path);
                return Ok(PageOutcome::Skipped { removed: 0 });
            }
            GeneratePolicy::SkipAndDelete => {
                let removed = remove_generated_page(
                    site,
                    &self.leaf_names,
                    self.routes.as_ref(),
                    &page.path,
                    false,
                );
                tracing::debug!("Skipping {}, removed {} earlier documents", page.path, removed);
                return Ok(PageOutcome::Skipped { removed });
            }
        }

        if let Some(outcome) = self.checkpoint(Stage::BeforeFetch, page, |observer| {
            observer.before_fetch(page)
        }) {
            return Ok(outcome);
        }

        let url = self.engine.absolute_url(&page.path);
        let (content_type, body) = match fetch_url(self.engine.client(), &url).await {
            FetchResult::Success {
                content_type, body, ..
            } => (content_type, body),
            failed => {
                let reason = failed.failure_reason().unwrap_or_default();
                tracing::warn!("Failed to fetch page {}: {}", page.path, reason);
                return Ok(PageOutcome::FetchFailed { reason });
            }
        };

        let document = self.document_type(content_type.as_deref());
        let mut content = String::from_utf8_lossy(&body).into_owned();

        if let Some(outcome) = self.checkpoint(Stage::AfterFetch, page, |observer| {
            observer.after_fetch(page, &mut content)
        }) {
            return Ok(outcome);
        }

        let content = fix_permalinks(&content, self.tree.as_ref());
        let mut ctx = PageContext::new(crawl);
        let mut content = rewrite_dependencies(
            &self.engine,
            &document.lookups,
            &page.path,
            content,
            0,
            &mut ctx,
        )
        .await;

        let alias = page
            .simple_address
            .as_deref()
            .map(ensure_page_path)
            .filter(|alias| *alias != page.path);

        let mut paths = vec![url_to_path(&site.output_path, &page.path).join(&document.file_name)];
        if let Some(alias) = &alias {
            paths.push(url_to_path(&site.output_path, alias).join(&document.file_name));
        }

        if let Some(outcome) = self.checkpoint(Stage::BeforeWrite, page, |observer| {
            observer.before_write(page, &mut content, &mut paths)
        }) {
            return Ok(outcome);
        }

        for path in &paths {
            write_file(path, content.as_bytes(), site.write_temporary_flag).await?;
        }

        let resources = ctx
            .page
            .values()
            .filter(|mapping| mapping.rewritten().is_some())
            .count();
        tracing::debug!("Wrote {} ({} resources)", page.path, resources);

        if let Some(outcome) = self.checkpoint(Stage::AfterWrite, page, |observer| {
            observer.after_write(page, &paths)
        }) {
            return Ok(outcome);
        }

        if site.use_routing {
            self.routes.register(&page.path);
            if let Some(alias) = &alias {
                self.routes.register(alias);
            }
        }

        Ok(PageOutcome::Written { paths, resources })
    }

    /// Runs one checkpoint; returns the outcome if an observer cancelled
    fn checkpoint(
        &self,
        stage: Stage,
        page: &PageEntry,
        mut notify: impl FnMut(&dyn PageObserver) -> Flow,
    ) -> Option<PageOutcome> {
        for observer in &self.observers {
            if let Flow::Cancel(reason) = notify(observer.as_ref()) {
                tracing::info!("Generation of {} cancelled at {}: {}", page.path, stage, reason);
                return Some(PageOutcome::Cancelled { stage, reason });
            }
        }
        None
    }

    /// Picks the document name and rewriters from the response content type
    ///
    /// Content types without a root-level, path-named rule fall back to the
    /// `.html` rule.
    fn document_type(&self, content_type: Option<&str>) -> DocumentType {
        let catalog = self.engine.catalog();

        let matched = content_type
            .and_then(|content_type| catalog.match_by_mime_type(content_type))
            .filter(|rule| {
                !rule.extension.is_empty() && rule.use_original_path && !rule.use_resource_folder
            });

        if let Some(rule) = matched {
            return DocumentType {
                file_name: format!("{}{}", rule.default_name(), rule.extension.to_ascii_lowercase()),
                lookups: rule.dependency_lookup.clone(),
            };
        }

        let html = catalog.match_by_extension(".html");
        DocumentType {
            file_name: format!("{}.html", html.map_or(DEFAULT_NAME, |rule| rule.default_name())),
            lookups: html.map_or_else(
                || vec![DependencyLookup::Html],
                |rule| rule.dependency_lookup.clone(),
            ),
        }
    }
}

/// Replaces `/link/<32 hex>.aspx` permalinks in `href`/`src` attributes
///
/// Permalinks the content tree cannot resolve stay as written.
pub fn fix_permalinks(content: &str, tree: &dyn ContentTree) -> String {
    PERMALINK
        .replace_all(content, |caps: &Captures| match tree.resolve_permalink(&caps["id"]) {
            Some(path) => format!("{}{}", &caps["attr"], path),
            None => caps[0].to_string(),
        })
        .into_owned()
}

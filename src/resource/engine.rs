//! Resource resolution engine
//!
//! Resolves one resource URL: fetch, classify, rewrite nested references,
//! name, write and record. Every failure degrades to [`Mapping::NoOp`] so
//! the referencing document keeps its original reference.

use crate::catalog::{ResourceTypeCatalog, ResourceTypeRule};
use crate::config::SiteConfig;
use crate::crawler::{fetch_url, FetchResult};
use crate::resource::map::{ChainId, Claim, CrawlResourceMap, Mapping, PageResourceMap};
use crate::resource::{file_exists, output_url, write_file};
use crate::rewrite::rewrite_dependencies;
use crate::url::{extension_of, parse_origin, strip_params, url_to_path};
use crate::Result;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Nesting depth after which references are left unresolved
///
/// Depth 0 is a resource referenced directly by a page; a stylesheet
/// importing a stylesheet that references an image puts the image at 2.
pub const MAX_RESOLVE_DEPTH: usize = 5;

/// A resource that was fetched, classified and stored
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// Bytes as written (after nested references were rewritten)
    pub data: Vec<u8>,

    /// Response content type
    pub content_type: Option<String>,

    /// The rule the resource was classified by
    pub rule: ResourceTypeRule,

    /// Origin-relative output URL
    pub output_url: String,
}

/// Resolution state of one page generation
pub struct PageContext {
    /// Chain identity used for single-flight ownership
    pub chain: ChainId,

    /// Crawl-scope map shared by every page of the crawl
    pub crawl: Arc<CrawlResourceMap>,

    /// Mappings used by this page, keyed by original URL
    pub page: PageResourceMap,
}

impl PageContext {
    /// Creates a context for a new page generation
    pub fn new(crawl: Arc<CrawlResourceMap>) -> Self {
        Self {
            chain: ChainId::next(),
            crawl,
            page: PageResourceMap::new(),
        }
    }

    fn record(&mut self, url: &str, mapping: &Mapping) {
        self.page.insert(url.to_string(), mapping.clone());
    }
}

/// Resolves resource URLs of one site
pub struct ResolutionEngine {
    site: Arc<SiteConfig>,
    catalog: Arc<ResourceTypeCatalog>,
    client: Client,
    origin: Url,
    origin_base: String,
}

impl ResolutionEngine {
    /// Creates an engine for a site
    ///
    /// # Errors
    ///
    /// Returns an error if the site's origin URL is not an absolute HTTP(S) URL.
    pub fn new(
        site: Arc<SiteConfig>,
        catalog: Arc<ResourceTypeCatalog>,
        client: Client,
    ) -> Result<Self> {
        let origin = parse_origin(&site.origin_url)?;
        let origin_base = site.origin_url.trim().trim_end_matches('/').to_string();

        Ok(Self {
            site,
            catalog,
            client,
            origin,
            origin_base,
        })
    }

    /// Returns the site configuration
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Returns the resource type catalog
    pub fn catalog(&self) -> &ResourceTypeCatalog {
        &self.catalog
    }

    /// Returns the HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the parsed site origin
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Builds the absolute fetch URL of an origin-relative URL
    pub fn absolute_url(&self, relative: &str) -> String {
        if relative.starts_with('/') {
            format!("{}{}", self.origin_base, relative)
        } else {
            format!("{}/{}", self.origin_base, relative)
        }
    }

    /// Resolves a resource URL to its mapping
    ///
    /// # Resolution Flow
    ///
    /// 1. Return the mapping already known to this page or to the crawl
    /// 2. Give up with a no-op past [`MAX_RESOLVE_DEPTH`] (not recorded, a
    ///    shallower reference to the same URL may still resolve it)
    /// 3. Claim the URL; if another page owns it, wait for its mapping
    /// 4. Fetch, classify, rewrite nested references at `depth + 1`, name
    ///    and write the resource
    /// 5. Publish the mapping to the crawl map and record it for the page
    ///
    /// # Arguments
    ///
    /// * `url` - Origin-relative URL (path and optional query)
    /// * `depth` - Nesting depth of the reference
    /// * `ctx` - Resolution state of the page being generated
    pub fn resolve<'a>(
        &'a self,
        url: &'a str,
        depth: usize,
        ctx: &'a mut PageContext,
    ) -> BoxFuture<'a, Mapping> {
        async move {
            if url.is_empty() || url.starts_with("//") || !url.starts_with('/') {
                return Mapping::NoOp;
            }

            if let Some(mapping) = ctx.page.get(url) {
                return mapping.clone();
            }

            if let Some(mapping) = ctx.crawl.get(url) {
                tracing::trace!("Crawl cache hit for {}", url);
                ctx.record(url, &mapping);
                return mapping;
            }

            if depth > MAX_RESOLVE_DEPTH {
                tracing::debug!("Depth ceiling reached at {} (depth {})", url, depth);
                return Mapping::NoOp;
            }

            let guard = match ctx.crawl.claim(url, ctx.chain) {
                Claim::Ready(mapping) => {
                    ctx.record(url, &mapping);
                    return mapping;
                }
                Claim::InFlight(in_flight) => {
                    return match ctx.crawl.wait(in_flight, ctx.chain).await {
                        Some(mapping) => {
                            ctx.record(url, &mapping);
                            mapping
                        }
                        None => {
                            tracing::debug!("Reference cycle at {}, leaving it unresolved", url);
                            Mapping::NoOp
                        }
                    };
                }
                Claim::Owned(guard) => guard,
            };

            let mapping = match self.materialize(url, depth, ctx).await {
                Some(resolved) => Mapping::Rewrite(resolved.output_url),
                None => Mapping::NoOp,
            };

            guard.complete(mapping.clone());
            ctx.record(url, &mapping);
            mapping
        }
        .boxed()
    }

    /// Fetches, classifies, rewrites, names and stores one resource
    async fn materialize(
        &self,
        url: &str,
        depth: usize,
        ctx: &mut PageContext,
    ) -> Option<ResolvedResource> {
        let path = strip_params(url);
        if path.ends_with('/') {
            tracing::trace!("Skipping directory-style reference {}", url);
            return None;
        }

        let extension = extension_of(url);
        let candidate = if extension.is_empty() {
            None
        } else {
            match self.catalog.match_by_extension(&extension) {
                Some(rule) => Some(rule.clone()),
                None => {
                    tracing::trace!("No resource type for extension {} ({})", extension, url);
                    return None;
                }
            }
        };

        let (content_type, body) = match fetch_url(&self.client, &self.absolute_url(url)).await {
            FetchResult::Success {
                content_type, body, ..
            } => (content_type, body),
            failed => {
                tracing::warn!(
                    "Failed to fetch resource {}: {}",
                    url,
                    failed.failure_reason().unwrap_or_default()
                );
                return None;
            }
        };

        if body.is_empty() {
            tracing::debug!("Empty response for {}, leaving reference unchanged", url);
            return None;
        }

        let (rule, force_hash) = match candidate {
            Some(rule) if !rule.is_wildcard() => (rule, false),
            Some(_) => (self.classify(url, content_type.as_deref())?, true),
            None => (self.classify(url, content_type.as_deref())?, false),
        };

        if rule.is_document() {
            tracing::trace!("{} is a page document, not following it", url);
            return None;
        }

        let data = if rule.dependency_lookup.is_empty() {
            body
        } else {
            match String::from_utf8(body) {
                Ok(text) => {
                    rewrite_dependencies(self, &rule.dependency_lookup, url, text, depth + 1, ctx)
                        .await
                        .into_bytes()
                }
                Err(e) => e.into_bytes(),
            }
        };

        let mut policy = rule.naming();
        if force_hash {
            policy = policy.hashed();
        }

        let new_url = output_url(
            &policy,
            &self.site.resource_folder,
            url,
            &rule.extension,
            &data,
        )?;
        let target = url_to_path(&self.site.output_path, &new_url);

        if policy.use_hash && file_exists(&target).await {
            tracing::trace!("{} already stored as {}", url, new_url);
        } else if let Err(e) = write_file(&target, &data, self.site.write_temporary_flag).await {
            // A hash name holds the same bytes whoever wrote it
            if policy.use_hash && file_exists(&target).await {
                tracing::debug!("{} stored concurrently as {}: {}", url, new_url, e);
            } else {
                tracing::warn!("Failed to store resource {}: {}", url, e);
                return None;
            }
        }

        tracing::debug!("Resolved {} -> {}", url, new_url);

        Some(ResolvedResource {
            data,
            content_type,
            rule,
            output_url: new_url,
        })
    }

    /// Resolves the concrete rule of a resource from its response content type
    fn classify(&self, url: &str, content_type: Option<&str>) -> Option<ResourceTypeRule> {
        let content_type = content_type.unwrap_or_default();
        match self.catalog.match_by_mime_type(content_type) {
            Some(rule) => Some(rule.clone()),
            None => {
                tracing::debug!(
                    "No resource type for content type '{}' ({})",
                    content_type,
                    url
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserAgentConfig;
    use crate::crawler::build_http_client;
    use crate::resource::content_hash;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine(server: &MockServer, dir: &TempDir) -> ResolutionEngine {
        let site = SiteConfig::new("test", &server.uri(), dir.path());
        let client = build_http_client(&UserAgentConfig::default()).unwrap();
        ResolutionEngine::new(
            Arc::new(site),
            Arc::new(ResourceTypeCatalog::defaults()),
            client,
        )
        .unwrap()
    }

    async fn serve(server: &MockServer, at: &str, content_type: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_resolve_hash_named_image() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        serve(&server, "/logo.png", "image/png", "PNGDATA").await;

        let engine = engine(&server, &dir);
        let mut ctx = PageContext::new(Arc::new(CrawlResourceMap::new()));
        let mapping = engine.resolve("/logo.png", 0, &mut ctx).await;

        let expected = format!("/resources/{}.png", content_hash(b"PNGDATA"));
        assert_eq!(mapping, Mapping::Rewrite(expected.clone()));
        assert!(dir.path().join(expected.trim_start_matches('/')).exists());
        assert_eq!(ctx.page.get("/logo.png"), Some(&mapping));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_identical_bytes_at_many_urls_share_one_name() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let body = "P".repeat(1024 * 1024);
        let urls: Vec<String> = (0..8).map(|i| format!("/copies/{}.png", i)).collect();
        for url in &urls {
            serve(&server, url, "image/png", &body).await;
        }

        let engine = engine(&server, &dir);
        let crawl = Arc::new(CrawlResourceMap::new());
        let mut contexts: Vec<PageContext> =
            urls.iter().map(|_| PageContext::new(crawl.clone())).collect();

        let mappings = futures::future::join_all(
            urls.iter()
                .zip(contexts.iter_mut())
                .map(|(url, ctx)| engine.resolve(url, 0, ctx)),
        )
        .await;

        let expected = format!("/resources/{}.png", content_hash(body.as_bytes()));
        let expected = Mapping::Rewrite(expected);
        assert!(mappings.iter().all(|mapping| *mapping == expected));
    }

    #[tokio::test]
    async fn test_not_found_is_noop_and_recorded() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let engine = engine(&server, &dir);
        let crawl = Arc::new(CrawlResourceMap::new());

        let mut first = PageContext::new(crawl.clone());
        assert_eq!(engine.resolve("/gone.css", 0, &mut first).await, Mapping::NoOp);

        let mut second = PageContext::new(crawl.clone());
        assert_eq!(engine.resolve("/gone.css", 0, &mut second).await, Mapping::NoOp);
        assert_eq!(crawl.get("/gone.css"), Some(Mapping::NoOp));
    }

    #[tokio::test]
    async fn test_depth_ceiling_is_not_recorded() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let engine = engine(&server, &dir);
        let crawl = Arc::new(CrawlResourceMap::new());
        let mut ctx = PageContext::new(crawl.clone());

        let mapping = engine.resolve("/deep.png", MAX_RESOLVE_DEPTH + 1, &mut ctx).await;

        assert_eq!(mapping, Mapping::NoOp);
        assert!(crawl.get("/deep.png").is_none());
    }

    #[tokio::test]
    async fn test_extensionless_resource_classified_by_content_type() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        serve(&server, "/bundles/site", "text/css; charset=utf-8", "a{}").await;

        let engine = engine(&server, &dir);
        let mut ctx = PageContext::new(Arc::new(CrawlResourceMap::new()));
        let mapping = engine.resolve("/bundles/site", 0, &mut ctx).await;

        assert_eq!(
            mapping,
            Mapping::Rewrite(format!("/resources/{}.css", content_hash(b"a{}")))
        );
    }

    #[tokio::test]
    async fn test_axd_resolved_by_content_type() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        serve(&server, "/WebResource.axd", "text/javascript", "var x;").await;

        let engine = engine(&server, &dir);
        let mut ctx = PageContext::new(Arc::new(CrawlResourceMap::new()));
        let mapping = engine.resolve("/WebResource.axd?d=abc", 0, &mut ctx).await;

        assert_eq!(
            mapping,
            Mapping::Rewrite(format!("/resources/{}.js", content_hash(b"var x;")))
        );
    }

    #[tokio::test]
    async fn test_page_documents_are_not_followed() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        serve(&server, "/contact", "text/html", "<html></html>").await;

        let engine = engine(&server, &dir);
        let mut ctx = PageContext::new(Arc::new(CrawlResourceMap::new()));

        assert_eq!(engine.resolve("/contact", 0, &mut ctx).await, Mapping::NoOp);
        assert_eq!(engine.resolve("/about/", 0, &mut ctx).await, Mapping::NoOp);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_not_fetched() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("MZ"))
            .expect(0)
            .mount(&server)
            .await;

        let engine = engine(&server, &dir);
        let mut ctx = PageContext::new(Arc::new(CrawlResourceMap::new()));
        assert_eq!(engine.resolve("/setup.exe", 0, &mut ctx).await, Mapping::NoOp);
    }

    #[tokio::test]
    async fn test_external_reference_is_noop() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let engine = engine(&server, &dir);
        let mut ctx = PageContext::new(Arc::new(CrawlResourceMap::new()));

        assert_eq!(
            engine.resolve("//cdn.example.com/a.js", 0, &mut ctx).await,
            Mapping::NoOp
        );
        assert_eq!(engine.resolve("", 0, &mut ctx).await, Mapping::NoOp);
    }
}

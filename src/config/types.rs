use crate::catalog::{ResourceTypeCatalog, ResourceTypeRule};
use crate::site::GeneratePolicy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration file structure for Static-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,

    #[serde(rename = "site", default)]
    pub sites: Vec<SiteConfig>,

    #[serde(rename = "resource-type", default)]
    pub resource_types: Vec<ResourceTypeRule>,

    /// Use only the configured resource types, without the built-ins
    #[serde(rename = "clear-default-resource-types", default)]
    pub clear_default_resource_types: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the mirror client
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the mirror client
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the mirror client
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "StaticMirror".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/static-mirror/static-mirror".to_string(),
        }
    }
}

/// Work queue ordering of a full crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlOrder {
    /// Keep the order the content tree returned
    #[default]
    Default,

    /// Sort lexicographically by path, so subtrees stay together
    UrlDepthFirst,

    /// Sort by path depth, shallowest pages first
    UrlBreadthFirst,
}

/// One mirrored site
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Display name used in logs and reports
    pub name: String,

    /// Origin the pages and resources are fetched from
    #[serde(rename = "origin-url")]
    pub origin_url: String,

    /// Root directory of the mirror
    #[serde(rename = "output-path")]
    pub output_path: PathBuf,

    /// Subfolder of `output-path` holding mirrored resources
    #[serde(rename = "resource-folder", default = "default_resource_folder")]
    pub resource_folder: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keep a route table of generated pages
    #[serde(rename = "use-routing", default)]
    pub use_routing: bool,

    /// Delete generated pages the content tree no longer has
    #[serde(rename = "remove-obsolete-pages", default)]
    pub remove_obsolete_pages: bool,

    /// Delete resources no page of the last crawl referenced
    #[serde(rename = "remove-obsolete-resources", default)]
    pub remove_obsolete_resources: bool,

    /// Maximum number of pages generated concurrently
    #[serde(rename = "max-parallelism", default = "default_parallelism")]
    pub max_parallelism: usize,

    #[serde(rename = "crawl-order", default)]
    pub crawl_order: CrawlOrder,

    /// Temporary-file attribute for written files (unset, true or false)
    #[serde(rename = "write-temporary-flag", default)]
    pub write_temporary_flag: Option<bool>,

    /// Page the full crawl enumerates from
    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: String,

    /// Where the route table is persisted (default `<output-path>/routes.toml`)
    #[serde(rename = "routes-file", default)]
    pub routes_file: Option<PathBuf>,

    /// Pages of the bundled content tree
    #[serde(default)]
    pub page: Vec<PageConfig>,

    /// Permalink id (32 hex digits) to page path
    #[serde(default)]
    pub permalinks: HashMap<String, String>,
}

/// A page of the bundled content tree
#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    /// Content identity; language versions share it (default: the path)
    #[serde(default)]
    pub id: Option<String>,

    /// Page path on the origin
    pub path: String,

    #[serde(default)]
    pub language: Option<String>,

    /// Alias the page is also written to
    #[serde(rename = "simple-address", default)]
    pub simple_address: Option<String>,

    /// Content ids whose changes require regenerating this page
    #[serde(rename = "depends-on", default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub policy: GeneratePolicy,
}

fn default_true() -> bool {
    true
}

fn default_resource_folder() -> String {
    "resources".to_string()
}

fn default_parallelism() -> usize {
    1
}

fn default_start_page() -> String {
    "/".to_string()
}

impl SiteConfig {
    /// Creates a site with default settings
    pub fn new(name: &str, origin_url: &str, output_path: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            origin_url: origin_url.to_string(),
            output_path: output_path.as_ref().to_path_buf(),
            resource_folder: default_resource_folder(),
            enabled: true,
            use_routing: false,
            remove_obsolete_pages: false,
            remove_obsolete_resources: false,
            max_parallelism: default_parallelism(),
            crawl_order: CrawlOrder::default(),
            write_temporary_flag: None,
            start_page: default_start_page(),
            routes_file: None,
            page: Vec::new(),
            permalinks: HashMap::new(),
        }
    }

    /// Returns the directory holding mirrored resources
    pub fn resource_path(&self) -> PathBuf {
        crate::url::url_to_path(&self.output_path, &self.resource_folder.replace('\\', "/"))
    }

    /// Returns the route table file
    pub fn routes_path(&self) -> PathBuf {
        self.routes_file
            .clone()
            .unwrap_or_else(|| self.output_path.join("routes.toml"))
    }
}

/// A site that failed validation and will not be mirrored
#[derive(Debug, Clone)]
pub struct DisabledSite {
    pub name: String,
    pub reason: String,
}

/// Validated configuration ready for mirroring
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub user_agent: UserAgentConfig,

    /// Sites that passed validation
    pub sites: Vec<SiteConfig>,

    /// Sites that were disabled in the file or failed validation
    pub disabled: Vec<DisabledSite>,

    /// Configured rules followed by the built-ins
    pub catalog: ResourceTypeCatalog,
}

//! Content-tree collaborators
//!
//! The mirror does not own the content model. It asks a [`ContentTree`]
//! which pages exist, how permalinks resolve and which pages depend on a
//! piece of content. [`StaticContentTree`] is the implementation backed by
//! the page list of a site configuration.

mod events;
mod routing;

pub use events::ContentEvent;
pub use routing::{NullRegistrar, RouteRegistrar, RouteTable, RouteToken};

use crate::config::{PageConfig, SiteConfig};
use crate::crawler::StopSignal;
use crate::url::{ensure_page_path, page_segments};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Identity of a content item in the content tree
pub type ContentId = String;

/// One language version of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    /// Content identity shared by all language versions
    pub id: ContentId,

    /// Site-relative page path in `/segment/segment/` form
    pub path: String,

    /// Language code of this version, if the site is multilingual
    pub language: Option<String>,

    /// Alias path the page is also written to
    pub simple_address: Option<String>,
}

/// What to do when a page would be generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratePolicy {
    /// Generate the page
    #[default]
    Generate,

    /// Leave the page and any earlier output alone
    Skip,

    /// Do not generate the page and remove earlier output
    SkipAndDelete,
}

/// Page enumeration and lookups provided by the content system
pub trait ContentTree: Send + Sync {
    /// Lists every page version at or below `start`
    ///
    /// The walk stops early, between tree levels, when `stop` is set.
    fn list_pages(&self, start: &str, stop: &StopSignal) -> Vec<PageEntry>;

    /// Returns true if a live page maps to the given page path
    fn page_exists(&self, path: &str) -> bool;

    /// Resolves a permalink id (32 hex digits) to a page path
    fn resolve_permalink(&self, id: &str) -> Option<String>;

    /// Returns every page version that references the given content item
    fn pages_depending_on(&self, id: &str) -> Vec<PageEntry>;

    /// Returns the generation policy of the page at `path`
    fn generate_policy(&self, path: &str) -> GeneratePolicy;
}

/// Node-level access used by [`walk_pages`]
pub trait ContentNodes {
    /// Returns the language versions of a content item
    fn versions(&self, id: &str) -> Vec<PageEntry>;

    /// Returns the ids of the direct children of a content item
    fn children(&self, id: &str) -> Vec<ContentId>;
}

/// Walks a content tree breadth-first from `roots`
///
/// A single visited set keyed by content id makes the walk safe on trees
/// with shortcuts or cycles. The stop signal is checked between levels.
pub fn walk_pages<N: ContentNodes + ?Sized>(
    nodes: &N,
    roots: Vec<ContentId>,
    stop: &StopSignal,
) -> Vec<PageEntry> {
    let mut visited: HashSet<ContentId> = HashSet::new();
    let mut pages = Vec::new();
    let mut level = roots;

    while !level.is_empty() {
        if stop.is_stopped() {
            tracing::info!("Stop requested, content tree walk ended early");
            break;
        }

        let mut next = Vec::new();
        for id in level {
            if !visited.insert(id.clone()) {
                continue;
            }
            pages.extend(nodes.versions(&id));
            next.extend(nodes.children(&id));
        }
        level = next;
    }

    pages
}

struct StaticPage {
    entry: PageEntry,
    depends_on: Vec<ContentId>,
    policy: GeneratePolicy,
}

/// Content tree backed by the `[[site.page]]` list of a site
///
/// The hierarchy is derived from paths: a page's parent is the nearest
/// listed page whose path is a proper prefix of its own.
pub struct StaticContentTree {
    pages: Vec<StaticPage>,
    children: HashMap<ContentId, Vec<ContentId>>,
    top_level: Vec<ContentId>,
    permalinks: HashMap<String, String>,
}

impl StaticContentTree {
    /// Builds the tree of a site
    pub fn from_site(site: &SiteConfig) -> Self {
        Self::new(&site.page, &site.permalinks)
    }

    /// Builds a tree from page definitions and a permalink table
    pub fn new(pages: &[PageConfig], permalinks: &HashMap<String, String>) -> Self {
        let pages: Vec<StaticPage> = pages
            .iter()
            .map(|page| {
                let path = ensure_page_path(&page.path);
                StaticPage {
                    entry: PageEntry {
                        id: page.id.clone().unwrap_or_else(|| path.clone()),
                        path,
                        language: page.language.clone(),
                        simple_address: page.simple_address.as_deref().map(ensure_page_path),
                    },
                    depends_on: page.depends_on.clone(),
                    policy: page.policy,
                }
            })
            .collect();

        let by_path: HashMap<&str, &ContentId> = pages
            .iter()
            .map(|page| (page.entry.path.as_str(), &page.entry.id))
            .collect();

        let mut children: HashMap<ContentId, Vec<ContentId>> = HashMap::new();
        let mut top_level = Vec::new();
        let mut placed = HashSet::new();

        for page in &pages {
            if !placed.insert(page.entry.id.clone()) {
                continue;
            }

            let segments = page_segments(&page.entry.path);
            let parent = (0..segments.len()).rev().find_map(|len| {
                let candidate = ensure_page_path(&segments[..len].join("/"));
                by_path
                    .get(candidate.as_str())
                    .filter(|id| ***id != page.entry.id)
            });

            match parent {
                Some(parent) => children
                    .entry((*parent).clone())
                    .or_default()
                    .push(page.entry.id.clone()),
                None => top_level.push(page.entry.id.clone()),
            }
        }

        let permalinks = permalinks
            .iter()
            .map(|(id, path)| (id.to_ascii_lowercase(), ensure_page_path(path)))
            .collect();

        Self {
            pages,
            children,
            top_level,
            permalinks,
        }
    }

    fn find(&self, path: &str) -> Option<&StaticPage> {
        let path = ensure_page_path(path);
        self.pages.iter().find(|page| {
            page.entry.path == path || page.entry.simple_address.as_deref() == Some(path.as_str())
        })
    }
}

impl ContentNodes for StaticContentTree {
    fn versions(&self, id: &str) -> Vec<PageEntry> {
        self.pages
            .iter()
            .filter(|page| page.entry.id == id)
            .map(|page| page.entry.clone())
            .collect()
    }

    fn children(&self, id: &str) -> Vec<ContentId> {
        self.children.get(id).cloned().unwrap_or_default()
    }
}

impl ContentTree for StaticContentTree {
    fn list_pages(&self, start: &str, stop: &StopSignal) -> Vec<PageEntry> {
        let start = ensure_page_path(start);

        let roots = match self.find(&start) {
            Some(page) => vec![page.entry.id.clone()],
            None => self
                .top_level
                .iter()
                .filter(|id| {
                    self.versions(id)
                        .iter()
                        .any(|entry| entry.path.starts_with(&start))
                })
                .cloned()
                .collect(),
        };

        walk_pages(self, roots, stop)
    }

    fn page_exists(&self, path: &str) -> bool {
        self.find(path)
            .is_some_and(|page| page.policy != GeneratePolicy::SkipAndDelete)
    }

    fn resolve_permalink(&self, id: &str) -> Option<String> {
        self.permalinks.get(&id.to_ascii_lowercase()).cloned()
    }

    fn pages_depending_on(&self, id: &str) -> Vec<PageEntry> {
        self.pages
            .iter()
            .filter(|page| page.depends_on.iter().any(|dependency| dependency == id))
            .map(|page| page.entry.clone())
            .collect()
    }

    fn generate_policy(&self, path: &str) -> GeneratePolicy {
        self.find(path)
            .map(|page| page.policy)
            .unwrap_or_default()
    }
}

//! Work queue and stop signal for full crawls
//!
//! This module handles:
//! - Collapsing duplicate page entries from the content tree
//! - Ordering the work queue per the site's crawl order
//! - The stop signal shared by the orchestrator and the content-tree walk

use crate::config::CrawlOrder;
use crate::site::PageEntry;
use crate::url::page_segments;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag
///
/// Polled between page generations and between content-tree levels;
/// generations already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ordered, duplicate-free list of pages to generate
#[derive(Debug, Clone)]
pub struct Worklist {
    entries: Vec<PageEntry>,
}

impl Worklist {
    /// Builds the work queue
    ///
    /// Entries sharing a path collapse into the first one. Sorting is
    /// stable, so entries that compare equal keep the content tree's order.
    ///
    /// | Order               | Sort key                       |
    /// |---------------------|--------------------------------|
    /// | `default`           | none                           |
    /// | `url-depth-first`   | path, lexicographic            |
    /// | `url-breadth-first` | number of path segments        |
    pub fn new(entries: Vec<PageEntry>, order: CrawlOrder) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<PageEntry> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.path.clone()))
            .collect();

        match order {
            CrawlOrder::Default => {}
            CrawlOrder::UrlDepthFirst => entries.sort_by(|a, b| a.path.cmp(&b.path)),
            CrawlOrder::UrlBreadthFirst => {
                entries.sort_by_key(|entry| page_segments(&entry.path).len())
            }
        }

        Self { entries }
    }

    /// Returns the number of queued pages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the queued pages in order
    pub fn entries(&self) -> &[PageEntry] {
        &self.entries
    }

    /// Splits off the first page, which is generated before the pool starts
    pub fn split_first(self) -> Option<(PageEntry, Vec<PageEntry>)> {
        let mut entries = self.entries.into_iter();
        let first = entries.next()?;
        Some((first, entries.collect()))
    }
}

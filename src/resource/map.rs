//! Resource maps shared by the pages of a crawl
//!
//! [`CrawlResourceMap`] is the dedup boundary of a crawl: the first page
//! generation that claims a URL fetches and stores it, every other
//! generation waits for that mapping instead of fetching again.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Outcome of resolving one resource URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapping {
    /// References are rewritten to this origin-relative output URL
    Rewrite(String),

    /// The resource could not be mirrored; references stay unchanged
    NoOp,
}

impl Mapping {
    /// Returns the output URL if the resource was mirrored
    pub fn rewritten(&self) -> Option<&str> {
        match self {
            Mapping::Rewrite(url) => Some(url),
            Mapping::NoOp => None,
        }
    }
}

/// Per-page resource map; owned by a single page generation
pub type PageResourceMap = HashMap<String, Mapping>;

static NEXT_CHAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one page generation's resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(u64);

impl ChainId {
    /// Allocates a new, process-unique chain id
    pub fn next() -> Self {
        Self(NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

struct Slot {
    owner: ChainId,
    state: watch::Sender<Option<Mapping>>,
}

/// Result of claiming a URL in the crawl map
pub enum Claim {
    /// The URL was resolved earlier in this crawl
    Ready(Mapping),

    /// The caller owns the URL and must resolve it
    Owned(ClaimGuard),

    /// Another chain is resolving the URL right now
    InFlight(InFlight),
}

/// Ownership of an unresolved URL
///
/// Dropping the guard without calling [`ClaimGuard::complete`] publishes a
/// no-op mapping, so waiters are never left hanging.
pub struct ClaimGuard {
    slot: Arc<Slot>,
    completed: bool,
}

impl ClaimGuard {
    /// Publishes the mapping to every waiter
    pub fn complete(mut self, mapping: Mapping) {
        self.slot.state.send_replace(Some(mapping));
        self.completed = true;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.slot.state.send_replace(Some(Mapping::NoOp));
        }
    }
}

/// Handle on a URL another chain is resolving
pub struct InFlight {
    owner: ChainId,
    rx: watch::Receiver<Option<Mapping>>,
}

impl InFlight {
    /// Chain currently resolving the URL
    pub fn owner(&self) -> ChainId {
        self.owner
    }
}

/// Crawl-scope map from original resource URL to its mapping
#[derive(Default)]
pub struct CrawlResourceMap {
    slots: DashMap<String, Arc<Slot>>,

    /// Wait-for graph: waiting chain -> chain it waits on
    waits: Mutex<HashMap<ChainId, ChainId>>,
}

impl CrawlResourceMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mapping of a URL if it has been resolved
    pub fn get(&self, url: &str) -> Option<Mapping> {
        let slot = self.slots.get(url)?;
        let mapping = slot.state.borrow().clone();
        mapping
    }

    /// Atomically claims a URL for resolution
    ///
    /// Exactly one caller per URL per crawl receives [`Claim::Owned`].
    pub fn claim(&self, url: &str, chain: ChainId) -> Claim {
        let slot = match self.slots.entry(url.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (state, _) = watch::channel(None);
                let slot = Arc::new(Slot {
                    owner: chain,
                    state,
                });
                entry.insert(slot.clone());
                return Claim::Owned(ClaimGuard {
                    slot,
                    completed: false,
                });
            }
        };

        let current = slot.state.borrow().clone();
        match current {
            Some(mapping) => Claim::Ready(mapping),
            None => Claim::InFlight(InFlight {
                owner: slot.owner,
                rx: slot.state.subscribe(),
            }),
        }
    }

    /// Waits for another chain to publish a mapping
    ///
    /// # Returns
    ///
    /// * `Some(Mapping)` - The owner's published mapping
    /// * `None` - Waiting would deadlock: the URL is owned by the caller's own
    ///   chain (a reference cycle) or by a chain that transitively waits on
    ///   the caller
    pub async fn wait(&self, in_flight: InFlight, chain: ChainId) -> Option<Mapping> {
        let InFlight { owner, mut rx } = in_flight;

        if owner == chain {
            return None;
        }

        let _edge = self.add_wait_edge(chain, owner)?;

        let mapping = match rx.wait_for(Option::is_some).await {
            Ok(state) => state.clone().unwrap_or(Mapping::NoOp),
            Err(_) => Mapping::NoOp,
        };
        Some(mapping)
    }

    /// Records `waiter -> owner` unless it closes a cycle
    fn add_wait_edge(&self, waiter: ChainId, owner: ChainId) -> Option<WaitEdge<'_>> {
        let mut waits = self.waits.lock().unwrap_or_else(|e| e.into_inner());

        let mut current = owner;
        let mut hops = 0;
        while let Some(next) = waits.get(&current) {
            if *next == waiter {
                return None;
            }
            current = *next;
            hops += 1;
            if hops > waits.len() {
                break;
            }
        }

        waits.insert(waiter, owner);
        Some(WaitEdge { map: self, waiter })
    }

    /// Returns every output URL mirrored during this crawl
    pub fn rewritten_urls(&self) -> HashSet<String> {
        self.slots
            .iter()
            .filter_map(|slot| {
                let mapping = slot.state.borrow().clone();
                mapping?.rewritten().map(str::to_string)
            })
            .collect()
    }

    /// Returns the number of URLs claimed during this crawl
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no URL has been claimed yet
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

struct WaitEdge<'a> {
    map: &'a CrawlResourceMap,
    waiter: ChainId,
}

impl Drop for WaitEdge<'_> {
    fn drop(&mut self) {
        let mut waits = self.map.waits.lock().unwrap_or_else(|e| e.into_inner());
        waits.remove(&self.waiter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rewrite(url: &str) -> Mapping {
        Mapping::Rewrite(url.to_string())
    }

    #[test]
    fn test_first_claim_owns() {
        let map = CrawlResourceMap::new();
        let chain = ChainId::next();

        let Claim::Owned(guard) = map.claim("/a.css", chain) else {
            panic!("first claim must own the URL");
        };
        assert!(map.get("/a.css").is_none());

        guard.complete(rewrite("/cache/a.css"));
        assert_eq!(map.get("/a.css"), Some(rewrite("/cache/a.css")));
        assert!(matches!(map.claim("/a.css", ChainId::next()), Claim::Ready(_)));
    }

    #[test]
    fn test_dropped_guard_publishes_noop() {
        let map = CrawlResourceMap::new();
        match map.claim("/a.css", ChainId::next()) {
            Claim::Owned(guard) => drop(guard),
            _ => panic!("expected ownership"),
        }
        assert_eq!(map.get("/a.css"), Some(Mapping::NoOp));
    }

    #[tokio::test]
    async fn test_waiter_receives_owner_mapping() {
        let map = Arc::new(CrawlResourceMap::new());
        let owner = ChainId::next();
        let waiter = ChainId::next();

        let Claim::Owned(guard) = map.claim("/bg.png", owner) else {
            panic!("expected ownership");
        };
        let Claim::InFlight(in_flight) = map.claim("/bg.png", waiter) else {
            panic!("expected in-flight");
        };
        assert_eq!(in_flight.owner(), owner);

        let wait_map = map.clone();
        let handle = tokio::spawn(async move { wait_map.wait(in_flight, waiter).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        guard.complete(rewrite("/cache/bg.png"));

        assert_eq!(handle.await.unwrap(), Some(rewrite("/cache/bg.png")));
    }

    #[tokio::test]
    async fn test_own_chain_cycle_does_not_wait() {
        let map = CrawlResourceMap::new();
        let chain = ChainId::next();

        let _guard = match map.claim("/a.css", chain) {
            Claim::Owned(guard) => guard,
            _ => panic!("expected ownership"),
        };
        let Claim::InFlight(in_flight) = map.claim("/a.css", chain) else {
            panic!("expected in-flight");
        };
        assert_eq!(map.wait(in_flight, chain).await, None);
    }

    #[tokio::test]
    async fn test_cross_chain_deadlock_is_detected() {
        let map = CrawlResourceMap::new();
        let first = ChainId::next();
        let second = ChainId::next();

        let _a = map.claim("/a.css", first);
        let _b = map.claim("/b.css", second);

        // second waits on /a.css owned by first
        let _edge = map.add_wait_edge(second, first).unwrap();

        // first waiting on /b.css owned by second would close the cycle
        let Claim::InFlight(in_flight) = map.claim("/b.css", first) else {
            panic!("expected in-flight");
        };
        assert_eq!(map.wait(in_flight, first).await, None);
    }

    #[test]
    fn test_rewritten_urls_skips_noops() {
        let map = CrawlResourceMap::new();
        if let Claim::Owned(guard) = map.claim("/a.css", ChainId::next()) {
            guard.complete(rewrite("/cache/a.css"));
        }
        if let Claim::Owned(guard) = map.claim("/missing.png", ChainId::next()) {
            guard.complete(Mapping::NoOp);
        }

        let urls = map.rewritten_urls();
        assert_eq!(urls.len(), 1);
        assert!(urls.contains("/cache/a.css"));
        assert_eq!(map.len(), 2);
    }
}

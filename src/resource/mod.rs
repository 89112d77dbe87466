//! Resource mirroring for Static-Mirror
//!
//! This module contains the content addresser, output naming, the
//! crawl-scope resource maps, the file store and the resolution engine
//! that ties them together.

mod addresser;
mod engine;
mod map;
mod naming;
mod store;

pub use addresser::content_hash;
pub use engine::{PageContext, ResolutionEngine, ResolvedResource, MAX_RESOLVE_DEPTH};
pub use map::{ChainId, Claim, ClaimGuard, CrawlResourceMap, InFlight, Mapping, PageResourceMap};
pub use naming::output_url;
pub use store::{file_exists, write_file};

//! Output module for mirror run reporting
//!
//! This module handles:
//! - Collecting page outcome counters during a crawl
//! - Printing the per-site summary after a run

mod report;

pub use report::{print_report, CrawlReport};

//! Crawl report
//!
//! This module collects the outcome counters of a mirror run and prints
//! them in a formatted summary.

use crate::crawler::PageOutcome;
use chrono::{DateTime, Utc};

/// Summary of one full crawl of a site
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Site name from the configuration
    pub site: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Pages the content tree listed (after duplicates collapsed)
    pub pages_found: usize,

    pub pages_generated: usize,
    pub pages_failed: usize,
    pub pages_cancelled: usize,
    pub pages_skipped: usize,

    /// Distinct output URLs references were rewritten to
    pub resources_resolved: usize,

    pub obsolete_pages_removed: usize,
    pub obsolete_resources_removed: usize,

    /// The crawl ended early on a stop request (sweeps were skipped)
    pub stopped: bool,

    /// Failed pages and why, in completion order
    pub failures: Vec<(String, String)>,
}

impl CrawlReport {
    /// Starts a report for `site`, stamped with the current time
    pub fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            pages_found: 0,
            pages_generated: 0,
            pages_failed: 0,
            pages_cancelled: 0,
            pages_skipped: 0,
            resources_resolved: 0,
            obsolete_pages_removed: 0,
            obsolete_resources_removed: 0,
            stopped: false,
            failures: Vec::new(),
        }
    }

    /// Counts the outcome of one page
    pub fn record(&mut self, path: &str, outcome: &PageOutcome) {
        match outcome {
            PageOutcome::Written { .. } => self.pages_generated += 1,
            PageOutcome::FetchFailed { reason } => {
                self.pages_failed += 1;
                self.failures.push((path.to_string(), reason.clone()));
            }
            PageOutcome::Cancelled { .. } => self.pages_cancelled += 1,
            PageOutcome::Skipped { .. } => self.pages_skipped += 1,
        }
    }

    /// Counts a page whose generation returned an error
    pub fn record_error(&mut self, path: &str, reason: &str) {
        self.pages_failed += 1;
        self.failures.push((path.to_string(), reason.to_string()));
    }

    /// Returns the number of pages with a recorded outcome
    pub fn pages_processed(&self) -> usize {
        self.pages_generated + self.pages_failed + self.pages_cancelled + self.pages_skipped
    }

    /// Stamps the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Returns the run time in seconds once finished
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

/// Prints a report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Mirror Report: {} ===\n", report.site);

    println!("Run:");
    println!("  Started: {}", report.started_at.to_rfc3339());
    match (&report.finished_at, report.duration_seconds()) {
        (Some(finished), Some(seconds)) => {
            println!("  Finished: {} ({}s)", finished.to_rfc3339(), seconds)
        }
        _ => println!("  Finished: -"),
    }
    if report.stopped {
        println!("  Stopped early, obsolete content was not swept");
    }
    println!();

    println!("Pages:");
    println!("  Found: {}", report.pages_found);
    println!("  Generated: {}", report.pages_generated);
    println!("  Failed: {}", report.pages_failed);
    println!("  Cancelled: {}", report.pages_cancelled);
    println!("  Skipped: {}", report.pages_skipped);
    println!();

    println!("Output:");
    println!("  Resources referenced: {}", report.resources_resolved);
    println!("  Obsolete pages removed: {}", report.obsolete_pages_removed);
    println!(
        "  Obsolete resources removed: {}",
        report.obsolete_resources_removed
    );
    println!();

    if !report.failures.is_empty() {
        println!("Failed Pages ({}):", report.failures.len());
        for (path, reason) in &report.failures {
            println!("  - {}: {}", path, reason);
        }
        println!();
    }

    let success_rate = if report.pages_found > 0 {
        (report.pages_generated as f64 / report.pages_found as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages generated)",
        success_rate, report.pages_generated, report.pages_found
    );
}

//! Statistics derived from a finished crawl
//!
//! This module summarizes a [`CrawlResult`] into counters and prints them
//! in a human-readable form.

use crate::crawler::{CrawlResult, ExtractedBy};

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    /// Search pages fetched during discovery
    pub pages_scraped: u32,

    /// Products attempted during enrichment
    pub attempted: usize,

    /// Products whose name was extracted
    pub named: usize,

    /// Products without a usable name
    pub failed: usize,

    /// Records produced by the inference service
    pub by_ai: usize,

    /// Records produced by markup heuristics
    pub by_heuristic: usize,

    /// Records carrying an error message
    pub degraded: usize,

    /// Wall-clock duration in seconds
    pub duration_seconds: i64,

    pub cancelled: bool,
}

impl CrawlStatistics {
    pub fn from_result(result: &CrawlResult) -> Self {
        let count_by = |by: ExtractedBy| {
            result
                .records
                .iter()
                .filter(|r| r.extracted_by == by)
                .count()
        };

        let named = result.named();

        Self {
            pages_scraped: result.pages_scraped,
            attempted: result.attempted(),
            named,
            failed: result.attempted() - named,
            by_ai: count_by(ExtractedBy::Ai),
            by_heuristic: count_by(ExtractedBy::Heuristic),
            degraded: result.records.iter().filter(|r| r.error.is_some()).count(),
            duration_seconds: (result.finished_at - result.started_at).num_seconds(),
            cancelled: result.cancelled,
        }
    }

    /// Percentage of attempted products that were named
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            (self.named as f64 / self.attempted as f64) * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Search pages scraped: {}", stats.pages_scraped);
    println!("  Products attempted: {}", stats.attempted);
    println!("  Duration: {}s", stats.duration_seconds);
    if stats.cancelled {
        println!("  Stopped early: yes");
    }
    println!();

    println!("Extraction:");
    println!("  Inference: {}", stats.by_ai);
    println!("  Heuristic: {}", stats.by_heuristic);
    println!("  Degraded: {}", stats.degraded);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} products named)",
        stats.success_rate(),
        stats.named,
        stats.attempted
    );
}

//! Records produced by a crawl

use crate::crawler::fields::{ExtractedBy, ExtractedFields, SENTINEL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error recorded when a product page could not be fetched
pub const FETCH_FAILED: &str = "Failed to fetch HTML";

/// Error recorded for products left unprocessed by cancellation
pub const CRAWL_CANCELLED: &str = "Crawl cancelled";

/// Error recorded when an enrichment slot dies mid-item
pub const TASK_ABORTED: &str = "Extraction task aborted";

/// Structured data for one discovered product URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub source_url: String,
    pub name: String,
    pub price: String,
    pub description: String,
    pub extracted_by: ExtractedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProductRecord {
    pub fn from_fields(source_url: impl Into<String>, fields: ExtractedFields) -> Self {
        Self {
            source_url: source_url.into(),
            name: fields.name,
            price: fields.price,
            description: fields.description,
            extracted_by: fields.extracted_by,
            error: fields.error,
        }
    }

    /// Sentinel record standing in for a product that could not be processed
    pub fn degraded(source_url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            name: SENTINEL.to_string(),
            price: SENTINEL.to_string(),
            description: SENTINEL.to_string(),
            extracted_by: ExtractedBy::None,
            error: Some(error.into()),
        }
    }

    /// True when a real product name was extracted
    pub fn is_named(&self) -> bool {
        self.name != SENTINEL
    }
}

/// Everything a crawl produced, in discovery order
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub records: Vec<ProductRecord>,

    /// Search pages successfully fetched during discovery
    pub pages_scraped: u32,

    /// Whether the crawl stopped early on request
    pub cancelled: bool,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlResult {
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            records: Vec::new(),
            pages_scraped: 0,
            cancelled: false,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Products attempted in enrichment
    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    /// Products whose name was extracted
    pub fn named(&self) -> usize {
        self.records.iter().filter(|r| r.is_named()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//! Crawler module for listing discovery and product enrichment
//!
//! This module contains the core harvesting logic, including:
//! - Proxied HTTP fetching with retry logic
//! - Product link and pagination extraction
//! - Field extraction with inference and heuristic strategies
//! - Request pacing and overall crawl coordination

mod coordinator;
mod fetcher;
mod fields;
mod links;
mod pacing;
mod record;

pub use coordinator::{Coordinator, CrawlSettings};
pub use fetcher::{build_http_client, PageFetchResult, PageSource, ProxyFetcher, RetryPolicy};
pub use fields::{
    parse_completion, ExtractedBy, ExtractedFields, ExtractionError, FallbackExtractor,
    FieldExtractor, HeuristicExtractor, InferenceExtractor, Sanitizer, EXTRACTION_PROMPT,
    SENTINEL,
};
pub use links::{
    ExtractedLinks, LinkExtractor, LinkRules, NEXT_PAGE_SELECTORS, PLACEHOLDER_PATTERNS,
    PRODUCT_PATH_MARKER, PRODUCT_SELECTORS,
};
pub use pacing::PacingGate;
pub use record::{CrawlResult, ProductRecord, CRAWL_CANCELLED, FETCH_FAILED, TASK_ABORTED};

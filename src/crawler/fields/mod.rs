//! Product field extraction
//!
//! Two interchangeable strategies sit behind [`FieldExtractor`]:
//! - [`InferenceExtractor`] asks a chat-completions service for the fields
//! - [`HeuristicExtractor`] walks selector cascades over the markup
//!
//! [`FallbackExtractor`] composes them so callers always get a record, and
//! [`ExtractedBy`] tells them which strategy produced it.

mod ai;
mod fallback;
mod heuristic;

pub use ai::{parse_completion, InferenceExtractor, Sanitizer, EXTRACTION_PROMPT};
pub use fallback::FallbackExtractor;
pub use heuristic::HeuristicExtractor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder for a field that could not be determined
pub const SENTINEL: &str = "-";

/// Which strategy produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractedBy {
    Ai,
    Heuristic,
    None,
}

/// Name, price and description pulled from a product page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: String,
    pub price: String,
    pub description: String,
    pub extracted_by: ExtractedBy,
    pub error: Option<String>,
}

impl ExtractedFields {
    /// All fields set to the sentinel
    pub fn sentinel(extracted_by: ExtractedBy) -> Self {
        Self {
            name: SENTINEL.to_string(),
            price: SENTINEL.to_string(),
            description: SENTINEL.to_string(),
            extracted_by,
            error: None,
        }
    }

    /// Sentinel record carrying the reason nothing could be extracted
    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            error: Some(cause.into()),
            ..Self::sentinel(ExtractedBy::None)
        }
    }

    /// True when the name is a real value
    pub fn has_name(&self) -> bool {
        let name = self.name.trim();
        !name.is_empty() && name != SENTINEL
    }
}

/// Failure of a single extraction strategy
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no inference credential configured")]
    NotConfigured,

    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference service returned HTTP {0}")]
    Status(u16),

    #[error("malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("extraction produced no product name")]
    NoName,

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// The single capability the orchestrator depends on
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// Extracts product fields from page markup
    async fn extract(&self, html: &str) -> Result<ExtractedFields, ExtractionError>;
}

/// Collapses runs of whitespace into single spaces and trims
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps at most `max` characters, respecting char boundaries
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

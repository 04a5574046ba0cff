use super::{ExtractedFields, ExtractionError, FieldExtractor};
use async_trait::async_trait;
use std::sync::Arc;

/// Primary/secondary composition that always produces fields
///
/// The primary runs first. Any primary error hands the same markup to the
/// secondary. If the secondary errors too, the all-sentinel record tagged
/// `none` is returned with the cause attached.
#[derive(Clone)]
pub struct FallbackExtractor {
    primary: Arc<dyn FieldExtractor>,
    secondary: Arc<dyn FieldExtractor>,
}

impl FallbackExtractor {
    pub fn new(primary: Arc<dyn FieldExtractor>, secondary: Arc<dyn FieldExtractor>) -> Self {
        Self { primary, secondary }
    }

    /// Infallible form of [`FieldExtractor::extract`]
    pub async fn extract_fields(&self, html: &str) -> ExtractedFields {
        match self.primary.extract(html).await {
            Ok(fields) => return fields,
            Err(ExtractionError::NotConfigured) => {
                tracing::debug!("Primary extractor not configured, using fallback");
            }
            Err(e) => {
                tracing::info!("Primary extractor failed ({}), using fallback", e);
            }
        }

        match self.secondary.extract(html).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("Fallback extractor failed: {}", e);
                ExtractedFields::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl FieldExtractor for FallbackExtractor {
    async fn extract(&self, html: &str) -> Result<ExtractedFields, ExtractionError> {
        Ok(self.extract_fields(html).await)
    }
}

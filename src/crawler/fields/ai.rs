//! Inference-backed field extraction
//!
//! Markup is truncated and stripped of scripts, styles and comments before it
//! is sent to a chat-completions endpoint together with a fixed instruction
//! prompt. The reply should be a JSON object; when it is not, a salvage pass
//! pulls the fields out of free text.

use super::{
    truncate_chars, ExtractedBy, ExtractedFields, ExtractionError, FieldExtractor, SENTINEL,
};
use crate::config::InferenceConfig;
use crate::crawler::fetcher::build_http_client;
use crate::HarvestError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Instruction sent as the system message
pub const EXTRACTION_PROMPT: &str = "You are an assistant that extracts product data from \
marketplace listing pages. Analyse the HTML you are given and return a JSON object with \
these keys:\n\
- \"name\": the full product title\n\
- \"price\": the listed price including currency\n\
- \"description\": the seller's product description\n\
Use '-' for any value you cannot find. Return only the JSON object, with no explanation.\n\
Example: {\"name\": \"Nike Air Max\", \"price\": \"$99.99\", \"description\": \"Running shoes...\"}";

const MAX_SALVAGED_DESCRIPTION_CHARS: usize = 500;

/// Inference requests are slower than page fetches
const INFERENCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Strips markup noise before it is sent for inference
#[derive(Debug, Clone)]
pub struct Sanitizer {
    max_chars: usize,
    scripts: Regex,
    styles: Regex,
    comments: Regex,
    whitespace: Regex,
}

impl Sanitizer {
    pub fn new(max_chars: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            max_chars,
            scripts: Regex::new(r"(?is)<script\b.*?</script\s*>")?,
            styles: Regex::new(r"(?is)<style\b.*?</style\s*>")?,
            comments: Regex::new(r"(?s)<!--.*?-->")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Truncates, then removes script/style/comment blocks and collapses whitespace
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_harvest::crawler::Sanitizer;
    ///
    /// let sanitizer = Sanitizer::new(10_000).unwrap();
    /// let cleaned = sanitizer.sanitize("<h1>Hi</h1>\n<script>var x;</script><!-- c -->  <p>x</p>");
    /// assert_eq!(cleaned, "<h1>Hi</h1> <p>x</p>");
    /// ```
    pub fn sanitize(&self, html: &str) -> String {
        let truncated = truncate_chars(html, self.max_chars);
        let without_scripts = self.scripts.replace_all(&truncated, "");
        let without_styles = self.styles.replace_all(&without_scripts, "");
        let without_comments = self.comments.replace_all(&without_styles, "");
        self.whitespace
            .replace_all(&without_comments, " ")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Regexes used when the reply is not valid JSON
#[derive(Debug, Clone)]
struct Salvage {
    object: Regex,
    name: Regex,
    price: Regex,
    description: Regex,
}

impl Salvage {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            object: Regex::new(r"(?s)\{.*\}")?,
            name: Regex::new(r#"(?i)name["']?\s*:\s*["']([^"']+)["']"#)?,
            price: Regex::new(r#"(?i)price["']?\s*:\s*["']([^"']+)["']"#)?,
            description: Regex::new(r#"(?i)description["']?\s*:\s*["']([^"']+)["']"#)?,
        })
    }

    fn capture(pattern: &Regex, text: &str) -> Option<String> {
        pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn from_text(&self, text: &str) -> ExtractedFields {
        let or_sentinel = |value: Option<String>| value.unwrap_or_else(|| SENTINEL.to_string());

        ExtractedFields {
            name: or_sentinel(Self::capture(&self.name, text)),
            price: or_sentinel(Self::capture(&self.price, text)),
            description: or_sentinel(
                Self::capture(&self.description, text)
                    .map(|d| truncate_chars(&d, MAX_SALVAGED_DESCRIPTION_CHARS)),
            ),
            extracted_by: ExtractedBy::Ai,
            error: None,
        }
    }
}

/// Turns a completion into fields, salvaging free text where needed
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::parse_completion;
///
/// let fields = parse_completion(r#"Sure! name: "Nike Air Max", price: "$80""#).unwrap();
/// assert_eq!(fields.name, "Nike Air Max");
/// assert_eq!(fields.price, "$80");
/// assert_eq!(fields.description, "-");
/// ```
pub fn parse_completion(content: &str) -> Result<ExtractedFields, regex::Error> {
    let salvage = Salvage::new()?;
    Ok(parse_with(&salvage, content))
}

fn parse_with(salvage: &Salvage, content: &str) -> ExtractedFields {
    if let Some(object) = parse_object(content.trim()) {
        return fields_from_object(&object);
    }

    tracing::debug!("Completion is not a JSON object, trying salvage");

    if let Some(object) = salvage
        .object
        .find(content)
        .and_then(|m| parse_object(m.as_str()))
    {
        return fields_from_object(&object);
    }

    salvage.from_text(content)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn fields_from_object(object: &Map<String, Value>) -> ExtractedFields {
    ExtractedFields {
        name: string_field(object, "name"),
        price: string_field(object, "price"),
        description: string_field(object, "description"),
        extracted_by: ExtractedBy::Ai,
        error: None,
    }
}

/// Reads a field leniently: numbers are stringified, blanks become the sentinel
fn string_field(object: &Map<String, Value>, key: &str) -> String {
    let value = match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    if value.is_empty() {
        SENTINEL.to_string()
    } else {
        value
    }
}

/// Primary strategy: a chat-completions service
pub struct InferenceExtractor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_attempts: u32,
    retry_delay: Duration,
    sanitizer: Sanitizer,
    salvage: Salvage,
}

impl InferenceExtractor {
    /// Creates an extractor from inference configuration
    ///
    /// Without an API key every call fails fast with
    /// [`ExtractionError::NotConfigured`].
    pub fn new(config: &InferenceConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            client: build_http_client(INFERENCE_TIMEOUT)?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            sanitizer: Sanitizer::new(config.max_input_chars)?,
            salvage: Salvage::new()?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// One request/response cycle
    async fn round_trip(
        &self,
        api_key: &str,
        cleaned: &str,
    ) -> Result<ExtractedFields, ExtractionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: EXTRACTION_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("HTML Content: {}", cleaned),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Status(status.as_u16()));
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractionError::MalformedResponse("no completion choices".to_string()))?;

        Ok(parse_with(&self.salvage, &content))
    }
}

#[async_trait]
impl FieldExtractor for InferenceExtractor {
    async fn extract(&self, html: &str) -> Result<ExtractedFields, ExtractionError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ExtractionError::NotConfigured);
        };

        let cleaned = self.sanitizer.sanitize(html);
        tracing::debug!("Sanitized markup down to {} chars", cleaned.chars().count());

        let mut last_error = ExtractionError::NoName;

        for attempt in 1..=self.max_attempts {
            match self.round_trip(api_key, &cleaned).await {
                Ok(fields) if fields.has_name() => {
                    tracing::debug!("Inference extracted fields on attempt {}", attempt);
                    return Ok(fields);
                }
                Ok(_) => {
                    tracing::info!(
                        "Inference attempt {}/{} returned no usable name",
                        attempt,
                        self.max_attempts
                    );
                    last_error = ExtractionError::NoName;
                }
                Err(e) => {
                    tracing::warn!(
                        "Inference attempt {}/{} failed: {}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    last_error = e;
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(ExtractionError::Exhausted {
            attempts: self.max_attempts,
            last: last_error.to_string(),
        })
    }
}

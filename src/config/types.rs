use serde::Deserialize;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Fetch proxy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Base endpoint of the fetch proxy
    #[serde(default = "default_proxy_endpoint")]
    pub endpoint: String,

    /// Proxy API key (SCRAPER_API_KEY overrides)
    #[serde(rename = "api-key", default)]
    pub api_key: String,

    /// Per-attempt request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per URL before giving up
    #[serde(rename = "max-attempts", default = "default_fetch_attempts")]
    pub max_attempts: u32,

    /// Backoff base; the wait before attempt n+1 is base * n
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Bodies at or under this many characters count as failures
    #[serde(rename = "min-body-length", default = "default_min_body_length")]
    pub min_body_length: usize,
}

/// Inference service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Chat-completions endpoint (AI_API_URL overrides)
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,

    /// Bearer token (AI_API_KEY overrides); heuristics only when absent
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(rename = "max-tokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Round trips before falling back to heuristics
    #[serde(rename = "max-attempts", default = "default_inference_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between round trips (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Markup is truncated to this many characters before sanitizing
    #[serde(rename = "max-input-chars", default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First search results page
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum number of search pages to walk
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Base used to resolve relative links found in markup
    #[serde(rename = "site-base-url", default = "default_site_base_url")]
    pub site_base_url: String,

    /// Minimum time between search page fetches (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Minimum time between product fetches within one slot (milliseconds)
    #[serde(rename = "item-delay-ms", default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Number of product pages processed concurrently
    #[serde(rename = "max-concurrent-items", default = "default_max_concurrent_items")]
    pub max_concurrent_items: u32,

    /// Maximum product links taken from a single search page
    #[serde(rename = "product-url-cap", default = "default_product_url_cap")]
    pub product_url_cap: usize,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// JSON file for harvested records; stdout when unset
    #[serde(rename = "results-path", default)]
    pub results_path: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_inference_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_proxy_endpoint() -> String {
    "http://api.scraperapi.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_min_body_length() -> usize {
    100
}

fn default_inference_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_inference_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_max_input_chars() -> usize {
    10_000
}

fn default_max_pages() -> u32 {
    2
}

fn default_site_base_url() -> String {
    "https://www.ebay.com".to_string()
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_item_delay_ms() -> u64 {
    1500
}

fn default_max_concurrent_items() -> u32 {
    1
}

fn default_product_url_cap() -> usize {
    15
}

use crate::config::types::{Config, CrawlerConfig, InferenceConfig, ProxyConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on concurrent product slots
const MAX_CONCURRENT_ITEMS: u32 = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_proxy_config(&config.proxy)?;
    validate_inference_config(&config.inference)?;
    validate_crawler_config(&config.crawler)?;
    Ok(())
}

/// Validates fetch proxy configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.api_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "proxy api-key is required (set it in the config or SCRAPER_API_KEY)".to_string(),
        ));
    }

    validate_http_url("proxy endpoint", &config.endpoint)?;

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "proxy max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "proxy timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates inference configuration
fn validate_inference_config(config: &InferenceConfig) -> Result<(), ConfigError> {
    validate_http_url("inference endpoint", &config.endpoint)?;

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "inference max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "inference temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.max_input_chars == 0 {
        return Err(ConfigError::Validation(
            "inference max-input-chars must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_http_url("start-url", &config.start_url)?;
    validate_http_url("site-base-url", &config.site_base_url)?;

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.max_concurrent_items < 1 || config.max_concurrent_items > MAX_CONCURRENT_ITEMS {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-items must be between 1 and {}, got {}",
            MAX_CONCURRENT_ITEMS, config.max_concurrent_items
        )));
    }

    if config.product_url_cap < 1 {
        return Err(ConfigError::Validation(
            "product-url-cap must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a URL parses and uses HTTP or HTTPS
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

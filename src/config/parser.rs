use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable holding the fetch proxy key
pub const PROXY_KEY_VAR: &str = "SCRAPER_API_KEY";

/// Environment variable holding the inference bearer token
pub const INFERENCE_KEY_VAR: &str = "AI_API_KEY";

/// Environment variable overriding the inference endpoint
pub const INFERENCE_URL_VAR: &str = "AI_API_URL";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are read from the process environment.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Max pages: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parses TOML content, applies environment overrides, and validates
///
/// `env` resolves an environment variable name to its value. Passing a
/// closure keeps tests independent of the real process environment.
pub fn parse_config<F>(content: &str, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config = toml::from_str(content)?;

    apply_env_overrides(&mut config, env);

    validate(&config)?;

    Ok(config)
}

/// Replaces file values with non-empty environment values
fn apply_env_overrides<F>(config: &mut Config, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty(PROXY_KEY_VAR) {
        config.proxy.api_key = key;
    }

    if let Some(key) = non_empty(INFERENCE_KEY_VAR) {
        config.inference.api_key = Some(key);
    }

    if let Some(endpoint) = non_empty(INFERENCE_URL_VAR) {
        config.inference.endpoint = endpoint;
    }

    // An empty key in the file means "no credential"
    if config
        .inference
        .api_key
        .as_deref()
        .is_some_and(|k| k.trim().is_empty())
    {
        config.inference.api_key = None;
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so two runs can be matched to the same settings.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

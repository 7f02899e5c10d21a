use crate::config::types::Config;
use crate::config::validation::{sanitize, validate};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, validates and sanitizes a configuration file
///
/// Structural problems (unreadable file, bad TOML, unusable user agent or seeds)
/// are errors. Out-of-range tunables are replaced by their defaults with a warning.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_frontier::config::load_config;
///
/// let config = load_config(Path::new("frontier.toml")).unwrap();
/// println!("Retry ceiling: {}", config.frontier.max_retries);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration text, applying the same checks as `load_config`
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;
    validate(&config)?;
    sanitize(&mut config);
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Checkpoints record this so a resumed crawl can tell when its configuration changed.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_config_text(&content))
}

/// Hex-encoded SHA-256 of configuration text
pub fn hash_config_text(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_config_text(&content)))
}

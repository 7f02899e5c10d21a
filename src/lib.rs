//! Sumi-Frontier: the scheduling core of a polite, large-scale web crawler
//!
//! This crate decides what gets fetched next across many hosts: it deduplicates
//! discovered URIs by fingerprint, keeps one politeness queue per host, enforces
//! robots.txt and operator quotas at dispatch time, adapts revisit intervals to how
//! often content changes, and checkpoints all of it so a crawl survives a restart.

pub mod checkpoint;
pub mod config;
pub mod filter;
pub mod frontier;
pub mod policy;
pub mod robots;
pub mod state;
pub mod store;
pub mod uri;
pub mod url;

use thiserror::Error;

/// Main error type for frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fingerprint store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid queue state transition for {class_key}: {from} -> {to}")]
    InvalidTransition {
        class_key: String,
        from: state::QueueState,
        to: state::QueueState,
    },

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    #[error("URI is not in flight: {0}")]
    NotInFlight(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for frontier operations
pub type Result<T> = std::result::Result<T, FrontierError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use filter::UriUniqFilter;
pub use frontier::{FetchOutcome, Frontier};
pub use state::{FetchStatus, QueueState};
pub use uri::{CandidateUri, CrawlUri, SchedulingDirective};

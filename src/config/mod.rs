//! Configuration module for Sumi-Frontier
//!
//! This module handles loading, parsing, validating and sanitizing TOML
//! configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_frontier::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("frontier.toml")).unwrap();
//! println!("Politeness floor: {} ms", config.frontier.min_delay_ms);
//! ```

pub mod defaults;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CheckpointConfig, Config, FingerprintConfig, FrontierConfig, QueueAssignment, QuotaConfig,
    RevisitConfig, RobotsConfig, StoreKind, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_config_text, load_config, load_config_with_hash, parse_config,
};
pub use validation::{sanitize, validate};

//! Integration tests for the frontier
//!
//! These drive the public API the way a crawler would: workers pull URIs with
//! `next()`, report outcomes, and schedule the links they "discover".

mod checkpoint_tests;
mod dedup_tests;
mod frontier_tests;

use sumi_frontier::config::{Config, UserAgentConfig};
use sumi_frontier::robots::HonoringKind;

/// Creates a test configuration with no politeness delay
pub fn test_config(honoring: HonoringKind) -> Config {
    let mut config = Config::new(UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    });
    config.robots.honoring_policy = honoring;
    config.frontier.delay_factor = 0.0;
    config.frontier.min_delay_ms = 0;
    config.frontier.max_delay_ms = 0;
    config.frontier.max_poll_ms = 200;
    config
}

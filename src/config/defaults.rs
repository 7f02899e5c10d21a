//! Fallback values for every optional configuration key
//!
//! These are used when a key is absent and when a present value is out of range.

use crate::config::types::{
    CheckpointConfig, FingerprintConfig, FrontierConfig, QueueAssignment, QuotaConfig,
    RevisitConfig, RobotsConfig, StoreKind,
};
use crate::robots::HonoringKind;
use std::path::PathBuf;

/// Longest interval any time-valued key may hold: ten years
pub const MAX_INTERVAL_SECONDS: u64 = 315_360_000;
pub const MAX_INTERVAL_MS: u64 = MAX_INTERVAL_SECONDS * 1_000;
pub const MAX_INTERVAL_HOURS: u64 = MAX_INTERVAL_SECONDS / 3_600;

// ===== [frontier] =====
pub const MAX_DEFERRALS: u32 = 10;
pub const MAX_RETRIES: u32 = 30;
pub const RETRY_DELAY_SECONDS: u64 = 900;
pub const DELAY_FACTOR: f64 = 5.0;
pub const MIN_DELAY_MS: u64 = 3_000;
pub const MAX_DELAY_MS: u64 = 30_000;
pub const RESPECT_CRAWL_DELAY: bool = true;
pub const PREFERENCE_EMBED_HOPS: u32 = 1;
pub const MAX_POLL_MS: u64 = 1_000;

// ===== [quotas] =====
/// Any negative ceiling means unlimited
pub const QUOTA_UNLIMITED: i64 = -1;
pub const FORCE_RETIRE: bool = false;

// ===== [revisit] =====
pub const REVISIT_ENABLED: bool = false;
pub const INITIAL_WAIT_SECONDS: u64 = 86_400;
pub const MIN_WAIT_SECONDS: u64 = 3_600;
pub const MAX_WAIT_SECONDS: u64 = 2_419_200;
pub const DEFAULT_WAIT_SECONDS: u64 = 259_200;
pub const CHANGED_FACTOR: f64 = 1.5;
pub const UNCHANGED_FACTOR: f64 = 1.5;

// ===== [robots] =====
pub const ROBOTS_VALIDITY_HOURS: u64 = 24;

// ===== [fingerprints] =====
pub const CAPACITY_BITS: u32 = 20;
pub const MIN_CAPACITY_BITS: u32 = 1;
pub const MAX_ENTRIES: u64 = 1 << 22;
pub const FINGERPRINT_PATH: &str = "fingerprints.fps";

// ===== [checkpoint] =====
pub const CHECKPOINT_DIRECTORY: &str = "checkpoints";
pub const CHECKPOINT_PREFIX: &str = "cp";

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            queue_assignment: QueueAssignment::HostnamePort,
            max_deferrals: MAX_DEFERRALS,
            max_retries: MAX_RETRIES,
            retry_delay_seconds: RETRY_DELAY_SECONDS,
            delay_factor: DELAY_FACTOR,
            min_delay_ms: MIN_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            respect_crawl_delay: RESPECT_CRAWL_DELAY,
            preference_embed_hops: PREFERENCE_EMBED_HOPS,
            max_poll_ms: MAX_POLL_MS,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            server_max_fetch_successes: QUOTA_UNLIMITED,
            server_max_success_kb: QUOTA_UNLIMITED,
            server_max_fetch_responses: QUOTA_UNLIMITED,
            server_max_total_kb: QUOTA_UNLIMITED,
            host_max_fetch_successes: QUOTA_UNLIMITED,
            host_max_success_kb: QUOTA_UNLIMITED,
            host_max_fetch_responses: QUOTA_UNLIMITED,
            host_max_total_kb: QUOTA_UNLIMITED,
            group_max_fetch_successes: QUOTA_UNLIMITED,
            group_max_success_kb: QUOTA_UNLIMITED,
            group_max_fetch_responses: QUOTA_UNLIMITED,
            group_max_total_kb: QUOTA_UNLIMITED,
            force_retire: FORCE_RETIRE,
        }
    }
}

impl Default for RevisitConfig {
    fn default() -> Self {
        Self {
            enabled: REVISIT_ENABLED,
            initial_wait_seconds: INITIAL_WAIT_SECONDS,
            min_wait_seconds: MIN_WAIT_SECONDS,
            max_wait_seconds: MAX_WAIT_SECONDS,
            default_wait_seconds: DEFAULT_WAIT_SECONDS,
            changed_factor: CHANGED_FACTOR,
            unchanged_factor: UNCHANGED_FACTOR,
        }
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            honoring_policy: HonoringKind::Classic,
            user_agents: Vec::new(),
            custom_robots: None,
            masquerade: false,
            validity_hours: ROBOTS_VALIDITY_HOURS,
        }
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Memory,
            capacity_bits: CAPACITY_BITS,
            max_entries: MAX_ENTRIES,
            path: PathBuf::from(FINGERPRINT_PATH),
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(CHECKPOINT_DIRECTORY),
            prefix: CHECKPOINT_PREFIX.to_string(),
        }
    }
}

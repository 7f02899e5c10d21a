//! Versioned frontier snapshot written to `frontier.json`

use crate::filter::FilterStats;
use crate::frontier::FrontierTotals;
use crate::robots::RobotsEntry;
use crate::state::{FetchStatsSnapshot, QueueState};
use crate::store::StoreDescriptor;
use crate::uri::CrawlUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

/// One class-key queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueSnapshot {
    pub class_key: String,
    pub state: QueueState,
    pub wake_time_ms: i64,
    #[serde(default)]
    pub retire_requested: bool,
    pub stats: FetchStatsSnapshot,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Pending URIs in dispatch order; revisits carry their revisit time
    pub pending: Vec<CrawlUri>,
}

/// Everything needed to rebuild a frontier apart from the fingerprint store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrontierSnapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Hash of the configuration file the crawl was running under
    pub config_hash: Option<String>,
    pub queues: Vec<QueueSnapshot>,
    /// URIs dispatched but not finished; re-queued on recovery
    pub in_flight: Vec<CrawlUri>,
    pub server_stats: BTreeMap<String, FetchStatsSnapshot>,
    pub host_stats: BTreeMap<String, FetchStatsSnapshot>,
    pub robots: Vec<RobotsEntry>,
    pub totals: FrontierTotals,
    pub filter: FilterStats,
    pub next_ordinal: u64,
    pub paused: bool,
    pub store: StoreDescriptor,
}

impl FrontierSnapshot {
    /// URIs waiting on queues plus those in flight
    pub fn uri_count(&self) -> usize {
        self.queues.iter().map(|q| q.pending.len()).sum::<usize>() + self.in_flight.len()
    }
}

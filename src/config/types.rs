use crate::policy::{QuotaCategory, QuotaMetric};
use crate::robots::HonoringKind;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for the frontier
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub quotas: QuotaConfig,
    #[serde(default)]
    pub revisit: RevisitConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub fingerprints: FingerprintConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Absolute URIs to start from
    #[serde(default)]
    pub seeds: Vec<String>,
}

impl Config {
    /// Creates a configuration with every optional section at its default
    pub fn new(user_agent: UserAgentConfig) -> Self {
        Self {
            user_agent,
            frontier: FrontierConfig::default(),
            quotas: QuotaConfig::default(),
            revisit: RevisitConfig::default(),
            robots: RobotsConfig::default(),
            fingerprints: FingerprintConfig::default(),
            checkpoint: CheckpointConfig::default(),
            seeds: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// The user-agent string sent with requests and matched against robots.txt
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// How URIs are grouped into politeness queues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueAssignment {
    /// One queue per `host[:port]`
    #[default]
    HostnamePort,
    /// One queue per host, whatever the port
    Hostname,
}

/// Queue scheduling and politeness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FrontierConfig {
    pub queue_assignment: QueueAssignment,

    /// Deferrals allowed while waiting on a prerequisite before giving up
    pub max_deferrals: u32,

    /// Fetch attempts allowed for retryable failures
    pub max_retries: u32,

    /// Snooze applied to a queue after a connection or DNS failure
    pub retry_delay_seconds: u64,

    /// Politeness delay as a multiple of the last fetch's duration
    pub delay_factor: f64,

    pub min_delay_ms: u64,

    pub max_delay_ms: u64,

    /// Honor robots.txt Crawl-delay as a lower bound on the politeness delay
    pub respect_crawl_delay: bool,

    /// Embeds within this many trailing hops of a page are scheduled SOON
    pub preference_embed_hops: u32,

    /// Longest a worker waits in one `next()` call for a queue to become ready
    pub max_poll_ms: u64,
}

/// Quota ceilings per category; negative means unlimited
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QuotaConfig {
    pub server_max_fetch_successes: i64,
    pub server_max_success_kb: i64,
    pub server_max_fetch_responses: i64,
    pub server_max_total_kb: i64,

    pub host_max_fetch_successes: i64,
    pub host_max_success_kb: i64,
    pub host_max_fetch_responses: i64,
    pub host_max_total_kb: i64,

    pub group_max_fetch_successes: i64,
    pub group_max_success_kb: i64,
    pub group_max_fetch_responses: i64,
    pub group_max_total_kb: i64,

    /// Retire the owning queue when a quota blocks a URI
    pub force_retire: bool,
}

impl QuotaConfig {
    /// Returns the configured ceiling, or None when unlimited
    pub fn ceiling(&self, category: QuotaCategory, metric: QuotaMetric) -> Option<u64> {
        let raw = *self.slot(category, metric);
        u64::try_from(raw).ok()
    }

    /// Sets one ceiling; a negative value removes it
    pub fn set_ceiling(&mut self, category: QuotaCategory, metric: QuotaMetric, value: i64) {
        *self.slot_mut(category, metric) = value;
    }

    fn slot(&self, category: QuotaCategory, metric: QuotaMetric) -> &i64 {
        use QuotaCategory::*;
        use QuotaMetric::*;
        match (category, metric) {
            (Server, FetchSuccesses) => &self.server_max_fetch_successes,
            (Server, SuccessKb) => &self.server_max_success_kb,
            (Server, FetchResponses) => &self.server_max_fetch_responses,
            (Server, TotalKb) => &self.server_max_total_kb,
            (Host, FetchSuccesses) => &self.host_max_fetch_successes,
            (Host, SuccessKb) => &self.host_max_success_kb,
            (Host, FetchResponses) => &self.host_max_fetch_responses,
            (Host, TotalKb) => &self.host_max_total_kb,
            (Group, FetchSuccesses) => &self.group_max_fetch_successes,
            (Group, SuccessKb) => &self.group_max_success_kb,
            (Group, FetchResponses) => &self.group_max_fetch_responses,
            (Group, TotalKb) => &self.group_max_total_kb,
        }
    }

    pub(crate) fn slot_mut(&mut self, category: QuotaCategory, metric: QuotaMetric) -> &mut i64 {
        use QuotaCategory::*;
        use QuotaMetric::*;
        match (category, metric) {
            (Server, FetchSuccesses) => &mut self.server_max_fetch_successes,
            (Server, SuccessKb) => &mut self.server_max_success_kb,
            (Server, FetchResponses) => &mut self.server_max_fetch_responses,
            (Server, TotalKb) => &mut self.server_max_total_kb,
            (Host, FetchSuccesses) => &mut self.host_max_fetch_successes,
            (Host, SuccessKb) => &mut self.host_max_success_kb,
            (Host, FetchResponses) => &mut self.host_max_fetch_responses,
            (Host, TotalKb) => &mut self.host_max_total_kb,
            (Group, FetchSuccesses) => &mut self.group_max_fetch_successes,
            (Group, SuccessKb) => &mut self.group_max_success_kb,
            (Group, FetchResponses) => &mut self.group_max_fetch_responses,
            (Group, TotalKb) => &mut self.group_max_total_kb,
        }
    }
}

/// Adaptive revisit configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RevisitConfig {
    /// Re-queue successfully fetched URIs for a later revisit
    pub enabled: bool,
    pub initial_wait_seconds: u64,
    pub min_wait_seconds: u64,
    pub max_wait_seconds: u64,
    pub default_wait_seconds: u64,
    pub changed_factor: f64,
    pub unchanged_factor: f64,
}

/// robots.txt configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RobotsConfig {
    pub honoring_policy: HonoringKind,

    /// Agents considered by the most-favored-set policy
    pub user_agents: Vec<String>,

    /// robots.txt text applied to every host by the custom policy
    pub custom_robots: Option<String>,

    /// Send the matched robots token as the request user-agent
    pub masquerade: bool,

    /// Hours a fetched robots.txt stays valid
    pub validity_hours: u64,
}

/// Fingerprint store strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    #[default]
    Memory,
    Disk,
    Cache,
}

/// Fingerprint store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FingerprintConfig {
    pub store: StoreKind,

    /// Initial table size as a power of two
    pub capacity_bits: u32,

    /// Ceiling for the cache store
    pub max_entries: u64,

    /// File used by the disk store
    pub path: PathBuf,
}

/// Checkpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CheckpointConfig {
    /// Directory holding one subdirectory per checkpoint
    pub directory: PathBuf,

    /// Prefix for checkpoint subdirectory names
    pub prefix: String,
}

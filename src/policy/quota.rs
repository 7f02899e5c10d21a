//! Quota enforcement at dispatch time
//!
//! Categories are checked in the order SERVER, HOST, GROUP and metrics in the order
//! fetch-successes, success-kb, fetch-responses, total-kb. The first ceiling reached
//! blocks the URI and nothing after it is evaluated.

use crate::config::QuotaConfig;
use crate::state::{FetchStats, FetchStatsSnapshot, FetchStatus};
use crate::uri::CrawlUri;
use std::fmt;
use tracing::debug;

/// Scope a set of counters belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaCategory {
    /// One `host:port`
    Server,
    /// One hostname, all ports
    Host,
    /// One queue (class key)
    Group,
}

impl QuotaCategory {
    pub fn all() -> [QuotaCategory; 3] {
        [Self::Server, Self::Host, Self::Group]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Host => "host",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for QuotaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counter compared against a ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaMetric {
    FetchSuccesses,
    SuccessKb,
    FetchResponses,
    TotalKb,
}

impl QuotaMetric {
    pub fn all() -> [QuotaMetric; 4] {
        [
            Self::FetchSuccesses,
            Self::SuccessKb,
            Self::FetchResponses,
            Self::TotalKb,
        ]
    }

    /// Name used in annotations
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchSuccesses => "fetchSuccesses",
            Self::SuccessKb => "successKb",
            Self::FetchResponses => "fetchResponses",
            Self::TotalKb => "totalKb",
        }
    }

    /// Name used in configuration keys after `{category}-max-`
    pub fn config_suffix(&self) -> &'static str {
        match self {
            Self::FetchSuccesses => "fetch-successes",
            Self::SuccessKb => "success-kb",
            Self::FetchResponses => "fetch-responses",
            Self::TotalKb => "total-kb",
        }
    }

    pub fn value(&self, stats: &FetchStatsSnapshot) -> u64 {
        match self {
            Self::FetchSuccesses => stats.fetch_successes,
            Self::SuccessKb => stats.success_kb(),
            Self::FetchResponses => stats.fetch_responses,
            Self::TotalKb => stats.total_kb(),
        }
    }
}

impl fmt::Display for QuotaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Annotation attached to a URI blocked by a quota
pub fn quota_annotation(category: QuotaCategory, metric: QuotaMetric) -> String {
    format!("Q:{}-{}", category.as_str(), metric.as_str())
}

/// Compares accumulated fetch statistics against configured ceilings
#[derive(Debug, Clone)]
pub struct QuotaEnforcer {
    config: QuotaConfig,
}

impl QuotaEnforcer {
    pub fn new(config: QuotaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Returns true if any ceiling is configured at all
    pub fn is_active(&self) -> bool {
        QuotaCategory::all().into_iter().any(|category| {
            QuotaMetric::all()
                .into_iter()
                .any(|metric| self.config.ceiling(category, metric).is_some())
        })
    }

    /// Returns the first metric of `category` at or over its ceiling
    pub fn tripped(&self, category: QuotaCategory, stats: &FetchStats) -> Option<QuotaMetric> {
        let snapshot = stats.snapshot();
        QuotaMetric::all().into_iter().find(|metric| {
            self.config
                .ceiling(category, *metric)
                .is_some_and(|ceiling| metric.value(&snapshot) >= ceiling)
        })
    }

    /// Checks one category and blocks `curi` if a ceiling is reached
    ///
    /// A blocked URI gets `BlockedByQuota`, a `Q:{category}-{metric}` annotation, and
    /// the force-retire flag when so configured.
    pub fn check_category(
        &self,
        curi: &mut CrawlUri,
        stats: &FetchStats,
        category: QuotaCategory,
    ) -> bool {
        let Some(metric) = self.tripped(category, stats) else {
            return false;
        };
        debug!(
            uri = %curi.uri(),
            category = category.as_str(),
            metric = metric.as_str(),
            "Quota reached"
        );
        curi.fetch_status = FetchStatus::BlockedByQuota;
        curi.annotate(quota_annotation(category, metric));
        if self.config.force_retire {
            curi.force_retire = true;
        }
        true
    }

    /// Checks server, host and group counters in that order
    ///
    /// Returns true if `curi` was blocked.
    pub fn check_quotas(
        &self,
        curi: &mut CrawlUri,
        server: &FetchStats,
        host: &FetchStats,
        group: &FetchStats,
    ) -> bool {
        self.check_category(curi, server, QuotaCategory::Server)
            || self.check_category(curi, host, QuotaCategory::Host)
            || self.check_category(curi, group, QuotaCategory::Group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::CandidateUri;
    use url::Url;

    fn curi() -> CrawlUri {
        let candidate = CandidateUri::new(Url::parse("http://ex.com/page").unwrap());
        CrawlUri::new(candidate, "ex.com".to_string(), 0)
    }

    fn enforcer(category: QuotaCategory, metric: QuotaMetric, ceiling: i64) -> QuotaEnforcer {
        let mut config = QuotaConfig::default();
        config.set_ceiling(category, metric, ceiling);
        QuotaEnforcer::new(config)
    }

    #[test]
    fn test_unlimited_never_blocks() {
        let enforcer = QuotaEnforcer::new(QuotaConfig::default());
        let stats = FetchStats::new();
        for _ in 0..100 {
            stats.tally(FetchStatus::Http(200), 10_000);
        }
        let mut c = curi();
        assert!(!enforcer.is_active());
        assert!(!enforcer.check_quotas(&mut c, &stats, &stats, &stats));
        assert_eq!(c.fetch_status, FetchStatus::Unattempted);
    }

    #[test]
    fn test_server_fetch_successes_example() {
        let enforcer = enforcer(QuotaCategory::Server, QuotaMetric::FetchSuccesses, 10);
        let server = FetchStats::new();
        let other = FetchStats::new();

        for _ in 0..9 {
            server.tally(FetchStatus::Http(200), 100);
        }
        let mut tenth = curi();
        assert!(!enforcer.check_quotas(&mut tenth, &server, &other, &other));

        server.tally(FetchStatus::Http(200), 100);
        let mut eleventh = curi();
        assert!(enforcer.check_quotas(&mut eleventh, &server, &other, &other));
        assert_eq!(eleventh.fetch_status, FetchStatus::BlockedByQuota);
        assert!(eleventh.has_annotation("Q:server-fetchSuccesses"));
        assert!(!eleventh.force_retire);
    }

    #[test]
    fn test_force_retire_flag() {
        let mut config = QuotaConfig::default();
        config.set_ceiling(QuotaCategory::Group, QuotaMetric::FetchResponses, 1);
        config.force_retire = true;
        let enforcer = QuotaEnforcer::new(config);
        let group = FetchStats::new();
        group.tally(FetchStatus::Http(404), 0);

        let mut c = curi();
        let idle = FetchStats::new();
        assert!(enforcer.check_quotas(&mut c, &idle, &idle, &group));
        assert!(c.force_retire);
        assert!(c.has_annotation("Q:group-fetchResponses"));
    }

    #[test]
    fn test_first_trip_stops_evaluation() {
        let mut config = QuotaConfig::default();
        config.set_ceiling(QuotaCategory::Server, QuotaMetric::TotalKb, 1);
        config.set_ceiling(QuotaCategory::Host, QuotaMetric::FetchSuccesses, 1);
        config.set_ceiling(QuotaCategory::Server, QuotaMetric::FetchResponses, 1);
        let enforcer = QuotaEnforcer::new(config);
        let stats = FetchStats::new();
        stats.tally(FetchStatus::Http(200), 4096);

        let mut c = curi();
        assert!(enforcer.check_quotas(&mut c, &stats, &stats, &stats));
        // fetch-responses precedes total-kb; host is never reached
        assert_eq!(c.annotations, vec!["Q:server-fetchResponses".to_string()]);
    }

    #[test]
    fn test_kb_metrics_use_whole_kilobytes() {
        let enforcer = enforcer(QuotaCategory::Host, QuotaMetric::SuccessKb, 2);
        let stats = FetchStats::new();
        stats.tally(FetchStatus::Http(200), 2047);
        assert_eq!(enforcer.tripped(QuotaCategory::Host, &stats), None);
        stats.tally(FetchStatus::Http(200), 1);
        assert_eq!(
            enforcer.tripped(QuotaCategory::Host, &stats),
            Some(QuotaMetric::SuccessKb)
        );
    }

    #[test]
    fn test_zero_ceiling_blocks_immediately() {
        let enforcer = enforcer(QuotaCategory::Server, QuotaMetric::FetchSuccesses, 0);
        let mut c = curi();
        let stats = FetchStats::new();
        assert!(enforcer.check_category(&mut c, &stats, QuotaCategory::Server));
    }

    #[test]
    fn test_block_is_monotonic_until_reset() {
        let enforcer = enforcer(QuotaCategory::Group, QuotaMetric::TotalKb, 3);
        let stats = FetchStats::new();
        let mut blocked_once = false;
        for step in 0..20 {
            let status = if step % 3 == 0 {
                FetchStatus::Http(500)
            } else {
                FetchStatus::Http(200)
            };
            stats.tally(status, 512);
            let mut c = curi();
            let blocked = enforcer.check_category(&mut c, &stats, QuotaCategory::Group);
            if blocked_once {
                assert!(blocked, "unblocked at step {step}");
            }
            blocked_once |= blocked;
        }
        assert!(blocked_once);

        stats.reset();
        let mut c = curi();
        assert!(!enforcer.check_category(&mut c, &stats, QuotaCategory::Group));
    }
}

use crate::config::RevisitConfig;
use crate::uri::{ContentState, CrawlUri};
use tracing::trace;

/// Revisit interval bounds and adjustment factors, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    pub initial_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub default_ms: u64,
    pub changed_factor: f64,
    pub unchanged_factor: f64,
}

impl WaitPolicy {
    pub fn from_config(config: &RevisitConfig) -> Self {
        Self {
            initial_ms: config.initial_wait_seconds.saturating_mul(1000),
            min_ms: config.min_wait_seconds.saturating_mul(1000),
            max_ms: config.max_wait_seconds.saturating_mul(1000),
            default_ms: config.default_wait_seconds.saturating_mul(1000),
            changed_factor: config.changed_factor,
            unchanged_factor: config.unchanged_factor,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::from_config(&RevisitConfig::default())
    }
}

/// Adapts a URI's revisit interval to how often its content changes
#[derive(Debug, Clone)]
pub struct WaitEvaluator {
    policy: WaitPolicy,
}

impl WaitEvaluator {
    pub fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Computes the next interval from the previous one
    ///
    /// `Unknown` content yields the default interval. Otherwise the prior interval
    /// (or the initial one on a first adjustment) is divided by the changed factor
    /// or multiplied by the unchanged factor. The result is always clamped to
    /// `[min, max]`.
    pub fn compute_wait(&self, state: ContentState, prior_ms: Option<u64>) -> u64 {
        let p = &self.policy;
        let raw = match state {
            ContentState::Unknown => p.default_ms as f64,
            ContentState::Changed => {
                prior_ms.unwrap_or(p.initial_ms) as f64 / usable_factor(p.changed_factor)
            }
            ContentState::Unchanged => {
                prior_ms.unwrap_or(p.initial_ms) as f64 * usable_factor(p.unchanged_factor)
            }
        };
        let max = p.max_ms.max(p.min_ms);
        // float-to-int `as` saturates, so huge products land on u64::MAX
        (raw.round() as u64).clamp(p.min_ms, max)
    }

    /// Records a new revisit interval on a successfully fetched URI
    ///
    /// Returns the interval, or None if the last fetch did not succeed.
    pub fn evaluate(&self, curi: &mut CrawlUri) -> Option<u64> {
        if !curi.fetch_status.is_success() {
            return None;
        }
        let wait = self.compute_wait(curi.content_state, curi.revisit_prior_ms);
        trace!(uri = %curi.uri(), state = ?curi.content_state, wait_ms = wait, "Revisit interval");
        curi.wait_interval_ms = Some(wait);
        if curi.content_state != ContentState::Unknown {
            curi.revisit_prior_ms = Some(wait);
        }
        Some(wait)
    }
}

fn usable_factor(factor: f64) -> f64 {
    if factor.is_finite() && factor > 0.0 {
        factor
    } else {
        1.0
    }
}

//! Frontier statistics summary
//!
//! A point-in-time view of queue states, totals and filter traffic, printed by the
//! binary's `--stats` mode and logged periodically while crawling.

use super::{Frontier, FrontierTotals};
use crate::filter::FilterStats;
use crate::state::{FetchStatsSnapshot, QueueState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Queues listed individually in a report
const REPORTED_QUEUES: usize = 20;

/// One queue's line in a report
#[derive(Debug, Clone, Serialize)]
pub struct QueueSummary {
    pub class_key: String,
    pub state: QueueState,
    pub pending: usize,
    pub wake_time_ms: i64,
    pub stats: FetchStatsSnapshot,
}

/// Frontier statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct FrontierReport {
    pub generated_at: DateTime<Utc>,

    pub totals: FrontierTotals,

    pub filter: FilterStats,

    /// Fingerprints held by the store
    pub fingerprints: u64,

    pub queued: usize,

    pub in_flight: usize,

    pub paused: bool,

    /// Authorities with a cached robots policy
    pub robots_cached: usize,

    /// Count of queues by state
    pub queues_by_state: BTreeMap<QueueState, usize>,

    /// Largest queues, most pending first
    pub largest_queues: Vec<QueueSummary>,
}

impl Frontier {
    /// Builds a statistics summary
    pub fn report(&self) -> FrontierReport {
        // store before state, the order `schedule` takes them in
        let filter = self.filter.stats();
        let fingerprints = self.filter.count();
        let state = self.shared.lock();

        let mut queues_by_state = BTreeMap::new();
        for queue in state.queues.values() {
            *queues_by_state.entry(queue.state()).or_insert(0) += 1;
        }

        let mut largest: Vec<QueueSummary> = state
            .queues
            .values()
            .filter(|queue| !queue.is_empty())
            .map(|queue| QueueSummary {
                class_key: queue.class_key().to_string(),
                state: queue.state(),
                pending: queue.len(),
                wake_time_ms: queue.wake_time_ms(),
                stats: queue.stats.snapshot(),
            })
            .collect();
        largest.sort_by(|a, b| {
            b.pending
                .cmp(&a.pending)
                .then_with(|| a.class_key.cmp(&b.class_key))
        });
        largest.truncate(REPORTED_QUEUES);

        FrontierReport {
            generated_at: Utc::now(),
            totals: state.totals,
            filter,
            fingerprints,
            queued: state.queued(),
            in_flight: state.in_flight.len(),
            paused: state.paused,
            robots_cached: self.shared.robots.len(),
            queues_by_state,
            largest_queues: largest,
        }
    }
}

impl FrontierReport {
    /// Share of finished URIs that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let finished = self.totals.succeeded + self.totals.failed + self.totals.disregarded;
        if finished == 0 {
            return 0.0;
        }
        (self.totals.succeeded as f64 / finished as f64) * 100.0
    }
}

impl fmt::Display for FrontierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Frontier Statistics ===")?;
        writeln!(f)?;

        writeln!(f, "Overview:")?;
        writeln!(f, "  Generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(f, "  Fingerprints: {}", self.fingerprints)?;
        writeln!(f, "  Queued URIs: {}", self.queued)?;
        writeln!(f, "  In flight: {}", self.in_flight)?;
        writeln!(f, "  Robots policies cached: {}", self.robots_cached)?;
        if self.paused {
            writeln!(f, "  PAUSED")?;
        }
        writeln!(f)?;

        let t = &self.totals;
        writeln!(f, "Totals:")?;
        writeln!(f, "  Admitted: {}", t.admitted)?;
        writeln!(f, "  Dispatched: {}", t.dispatched)?;
        writeln!(f, "  Succeeded: {}", t.succeeded)?;
        writeln!(f, "  Failed: {}", t.failed)?;
        writeln!(f, "  Disregarded: {}", t.disregarded)?;
        writeln!(f, "  Retried: {}", t.retried)?;
        writeln!(f, "  Deferred: {}", t.deferred)?;
        writeln!(f, "  Revisits scheduled: {}", t.revisits)?;
        writeln!(f)?;

        writeln!(f, "Dedup Filter:")?;
        writeln!(f, "  Added: {}", self.filter.added)?;
        writeln!(f, "  Duplicates: {}", self.filter.duplicates)?;
        writeln!(f, "  Forced: {}", self.filter.forced)?;
        writeln!(f)?;

        if !self.queues_by_state.is_empty() {
            writeln!(f, "Queues by State:")?;
            for (state, count) in &self.queues_by_state {
                writeln!(f, "  {}: {}", state, count)?;
            }
            writeln!(f)?;
        }

        if !self.largest_queues.is_empty() {
            writeln!(f, "Largest Queues ({}):", self.largest_queues.len())?;
            for queue in &self.largest_queues {
                writeln!(
                    f,
                    "  - {} [{}] pending={} successes={} responses={} kb={}",
                    queue.class_key,
                    queue.state,
                    queue.pending,
                    queue.stats.fetch_successes,
                    queue.stats.fetch_responses,
                    queue.stats.total_kb()
                )?;
            }
            writeln!(f)?;
        }

        write!(
            f,
            "Success Rate: {:.1}% ({} / {} URIs finished successfully)",
            self.success_rate(),
            t.succeeded,
            t.succeeded + t.failed + t.disregarded
        )
    }
}

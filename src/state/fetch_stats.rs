//! Fetch statistics shared between workers
//!
//! Counters are plain atomics: each is independent, so relaxed increments are enough
//! and no lock is needed to tally a completed fetch.

use crate::state::FetchStatus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for one server, host or queue
#[derive(Debug, Default)]
pub struct FetchStats {
    fetch_successes: AtomicU64,
    fetch_responses: AtomicU64,
    success_bytes: AtomicU64,
    total_bytes: AtomicU64,
}

/// Point-in-time copy of `FetchStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatsSnapshot {
    pub fetch_successes: u64,
    pub fetch_responses: u64,
    pub success_bytes: u64,
    pub total_bytes: u64,
}

impl FetchStatsSnapshot {
    pub fn success_kb(&self) -> u64 {
        self.success_bytes / 1024
    }

    pub fn total_kb(&self) -> u64 {
        self.total_bytes / 1024
    }
}

impl FetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores counters from a snapshot
    pub fn from_snapshot(snapshot: &FetchStatsSnapshot) -> Self {
        Self {
            fetch_successes: AtomicU64::new(snapshot.fetch_successes),
            fetch_responses: AtomicU64::new(snapshot.fetch_responses),
            success_bytes: AtomicU64::new(snapshot.success_bytes),
            total_bytes: AtomicU64::new(snapshot.total_bytes),
        }
    }

    /// Accounts for one completed fetch
    ///
    /// Only server responses count; transport failures and policy dispositions leave
    /// the counters untouched.
    pub fn tally(&self, status: FetchStatus, content_size: u64) {
        if !status.is_response() {
            return;
        }
        self.fetch_responses.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(content_size, Ordering::Relaxed);
        if status.is_success() {
            self.fetch_successes.fetch_add(1, Ordering::Relaxed);
            self.success_bytes.fetch_add(content_size, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
            fetch_responses: self.fetch_responses.load(Ordering::Relaxed),
            success_bytes: self.success_bytes.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter
    pub fn reset(&self) {
        self.fetch_successes.store(0, Ordering::Relaxed);
        self.fetch_responses.store(0, Ordering::Relaxed);
        self.success_bytes.store(0, Ordering::Relaxed);
        self.total_bytes.store(0, Ordering::Relaxed);
    }
}

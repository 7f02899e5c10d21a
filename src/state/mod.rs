//! State module for tracking frontier progress
//!
//! # Components
//!
//! - `FetchStatus`: outcome codes recorded on each crawl URI
//! - `QueueState`: the per-queue scheduling state machine
//! - `FetchStats`: atomically updated fetch counters per server, host and queue

mod fetch_stats;
mod fetch_status;
mod queue_state;

// Re-export main types
pub use fetch_stats::{FetchStats, FetchStatsSnapshot};
pub use fetch_status::FetchStatus;
pub use queue_state::QueueState;

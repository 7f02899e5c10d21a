//! Candidate and crawl URIs
//!
//! A `CandidateUri` is what link extraction hands to the dedup filter; once admitted
//! it becomes a `CrawlUri` carrying per-fetch state through the frontier.

mod candidate;
mod crawl_uri;

pub use candidate::{CandidateUri, Hop, SchedulingDirective};
pub use crawl_uri::{ContentState, CrawlUri};

//! Robots.txt handling module
//!
//! This module parses robots.txt into an exclusion policy, evaluates paths against
//! it under a configurable honoring strategy, and caches one policy per authority.
//! Fetching the file itself is the transport's job: the frontier schedules
//! `/robots.txt` as a prerequisite and hands the result to `RobotsExclusionPolicy::from_fetch`.

mod cache;
mod honoring;
mod policy;

pub use cache::{CachedRobots, RobotsCache, RobotsEntry, RobotsSource};
pub use honoring::{HonoringKind, HonoringPolicy};
pub use policy::{path_query, RobotsExclusionPolicy, RobotsRules, RobotsVerdict};

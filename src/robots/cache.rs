//! Per-host robots policy cache
//!
//! Policies are published as immutable `Arc`s. A refetch replaces the entry with a
//! new instance, so readers holding the old one never see a half-built policy.

use crate::robots::RobotsExclusionPolicy;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Cached robots policy for one authority
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub policy: Arc<RobotsExclusionPolicy>,

    /// When the robots.txt was fetched, in epoch milliseconds
    pub fetched_at_ms: i64,
}

impl CachedRobots {
    pub fn new(policy: RobotsExclusionPolicy, fetched_at_ms: i64) -> Self {
        Self {
            policy: Arc::new(policy),
            fetched_at_ms,
        }
    }

    /// Returns how long ago the robots.txt was fetched
    pub fn age(&self, now_ms: i64) -> Duration {
        Duration::milliseconds(now_ms.saturating_sub(self.fetched_at_ms))
    }

    /// Checks if the entry is older than `validity`
    pub fn is_stale(&self, now_ms: i64, validity: Duration) -> bool {
        self.age(now_ms) > validity
    }
}

/// Serialized form of one cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RobotsSource {
    AllowAll,
    DenyAll,
    Parsed { text: String },
}

impl RobotsSource {
    fn of(policy: &RobotsExclusionPolicy) -> Self {
        match policy {
            RobotsExclusionPolicy::AllowAll => Self::AllowAll,
            RobotsExclusionPolicy::DenyAll => Self::DenyAll,
            RobotsExclusionPolicy::Normal(rules) => Self::Parsed {
                text: rules.text().to_string(),
            },
        }
    }

    fn into_policy(self) -> RobotsExclusionPolicy {
        match self {
            Self::AllowAll => RobotsExclusionPolicy::AllowAll,
            Self::DenyAll => RobotsExclusionPolicy::DenyAll,
            Self::Parsed { text } => RobotsExclusionPolicy::parse(&text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotsEntry {
    pub authority: String,
    pub source: RobotsSource,
    pub fetched_at_ms: i64,
}

/// Read-mostly map from authority to its current robots policy
#[derive(Debug)]
pub struct RobotsCache {
    entries: RwLock<HashMap<String, CachedRobots>>,
    validity: Duration,
}

impl RobotsCache {
    pub fn new(validity: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            validity,
        }
    }

    /// Returns the fresh policy for `authority`, if any
    pub fn get(&self, authority: &str, now_ms: i64) -> Option<Arc<RobotsExclusionPolicy>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(authority)
            .filter(|cached| !cached.is_stale(now_ms, self.validity))
            .map(|cached| Arc::clone(&cached.policy))
    }

    /// Returns true if an entry exists but has expired
    pub fn is_expired(&self, authority: &str, now_ms: i64) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(authority)
            .is_some_and(|cached| cached.is_stale(now_ms, self.validity))
    }

    /// Publishes a new policy for `authority`
    pub fn insert(&self, authority: &str, policy: RobotsExclusionPolicy, now_ms: i64) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(authority.to_string(), CachedRobots::new(policy, now_ms));
    }

    pub fn remove(&self, authority: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(authority).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries sorted by authority
    pub fn snapshot(&self) -> Vec<RobotsEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<RobotsEntry> = entries
            .iter()
            .map(|(authority, cached)| RobotsEntry {
                authority: authority.clone(),
                source: RobotsSource::of(&cached.policy),
                fetched_at_ms: cached.fetched_at_ms,
            })
            .collect();
        out.sort_by(|a, b| a.authority.cmp(&b.authority));
        out
    }

    /// Replaces the cache contents with `entries`
    pub fn restore(&self, entries: Vec<RobotsEntry>) {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
        for entry in entries {
            map.insert(
                entry.authority,
                CachedRobots::new(entry.source.into_policy(), entry.fetched_at_ms),
            );
        }
    }
}

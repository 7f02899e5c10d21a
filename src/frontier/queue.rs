//! One politeness queue per class key
//!
//! A queue holds three tiers of pending URIs (expedite, soon, normal) plus a
//! time-ordered set of revisits that join the tiers once they fall due.

use crate::state::{FetchStats, QueueState};
use crate::uri::CrawlUri;
use crate::FrontierError;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

const TIERS: usize = 3;

#[derive(Debug)]
pub struct WorkQueue {
    class_key: String,
    tiers: [VecDeque<CrawlUri>; TIERS],
    /// Keyed by (revisit time, ordinal)
    revisits: BTreeMap<(i64, u64), CrawlUri>,
    pub(crate) state: QueueState,
    /// Not dispatchable before this time
    pub(crate) wake_time_ms: i64,
    pub(crate) stats: Arc<FetchStats>,
    /// Operator retired the queue while a URI was in flight
    pub(crate) retire_requested: bool,
    /// A URI is waiting on a prerequisite that has not reached the queue yet
    pub(crate) awaiting_prerequisite: bool,
    /// Entry currently held in the frontier's ready set
    pub(crate) ready_entry: Option<(i64, u64)>,
    /// Servers and hosts whose URIs passed through this queue
    pub(crate) servers: BTreeSet<String>,
    pub(crate) hosts: BTreeSet<String>,
}

impl WorkQueue {
    pub fn new(class_key: impl Into<String>) -> Self {
        Self {
            class_key: class_key.into(),
            tiers: Default::default(),
            revisits: BTreeMap::new(),
            state: QueueState::Empty,
            wake_time_ms: 0,
            stats: Arc::new(FetchStats::new()),
            retire_requested: false,
            awaiting_prerequisite: false,
            ready_entry: None,
            servers: BTreeSet::new(),
            hosts: BTreeSet::new(),
        }
    }

    pub fn class_key(&self) -> &str {
        &self.class_key
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn wake_time_ms(&self) -> i64 {
        self.wake_time_ms
    }

    /// URIs waiting in the tiers or as scheduled revisits
    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum::<usize>() + self.revisits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a URI at the back of its tier, or to the revisit set if it carries a
    /// revisit time
    pub fn enqueue(&mut self, curi: CrawlUri) {
        match curi.revisit_at_ms {
            Some(at) => {
                self.revisits.insert((at, curi.ordinal), curi);
            }
            None => self.tiers[curi.directive().tier()].push_back(curi),
        }
    }

    /// Puts a URI back at the head of its tier
    pub fn enqueue_front(&mut self, curi: CrawlUri) {
        self.tiers[curi.directive().tier()].push_front(curi);
    }

    /// Moves revisits due at `now_ms` into the tiers
    pub fn promote_due(&mut self, now_ms: i64) {
        while let Some(entry) = self.revisits.first_entry() {
            if entry.key().0 > now_ms {
                break;
            }
            let mut curi = entry.remove();
            curi.revisit_at_ms = None;
            self.tiers[curi.directive().tier()].push_back(curi);
        }
    }

    /// Takes the most urgent pending URI
    pub fn pop_next(&mut self, now_ms: i64) -> Option<CrawlUri> {
        self.promote_due(now_ms);
        self.tiers.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Earliest time this queue could hand out a URI, ignoring its state
    pub fn eligible_at(&self) -> Option<i64> {
        if self.tiers.iter().any(|tier| !tier.is_empty()) {
            return Some(self.wake_time_ms);
        }
        self.revisits
            .keys()
            .next()
            .map(|(at, _)| (*at).max(self.wake_time_ms))
    }

    /// Moves to `next`, rejecting moves the state machine forbids
    pub fn transition(&mut self, next: QueueState) -> Result<(), FrontierError> {
        if !self.state.can_transition_to(next) {
            return Err(FrontierError::InvalidTransition {
                class_key: self.class_key.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Removes and returns every pending URI matching `predicate`
    pub fn remove_matching<F>(&mut self, mut predicate: F) -> Vec<CrawlUri>
    where
        F: FnMut(&CrawlUri) -> bool,
    {
        let mut removed = Vec::new();
        for tier in &mut self.tiers {
            let mut kept = VecDeque::with_capacity(tier.len());
            for curi in tier.drain(..) {
                if predicate(&curi) {
                    removed.push(curi);
                } else {
                    kept.push_back(curi);
                }
            }
            *tier = kept;
        }
        let due: Vec<(i64, u64)> = self
            .revisits
            .iter()
            .filter_map(|(key, curi)| predicate(curi).then_some(*key))
            .collect();
        for key in due {
            if let Some(curi) = self.revisits.remove(&key) {
                removed.push(curi);
            }
        }
        removed
    }

    /// Pending URIs in dispatch order, revisits last
    pub fn pending(&self) -> impl Iterator<Item = &CrawlUri> {
        self.tiers
            .iter()
            .flat_map(|tier| tier.iter())
            .chain(self.revisits.values())
    }
}

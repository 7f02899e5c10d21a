//! Per-queue state machine
//!
//! A queue cycles `Ready -> Dispatched -> Ready` while it has work. Completion of the
//! in-flight URI decides where it goes next: back to `Ready` (possibly with a later
//! wake time), to `Empty`, or to `Retired`. `Retired` is left only through
//! explicit reinstatement.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling state of one class-key queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueState {
    /// No pending URIs
    Empty,

    /// Pending URIs; dispatchable once the wake time has passed
    Ready,

    /// One URI is in flight; nothing else may be dispatched from this queue
    Dispatched,

    /// Withdrawn from scheduling by quota or operator action
    Retired,
}

impl QueueState {
    /// Returns true if the queue may hand out a URI (subject to its wake time)
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if `self -> next` is a legal move
    ///
    /// Staying in place is allowed except for `Dispatched`, since a second dispatch
    /// would put two URIs of one host in flight.
    pub fn can_transition_to(&self, next: QueueState) -> bool {
        use QueueState::*;
        match (self, next) {
            (Dispatched, Dispatched) => false,
            (a, b) if *a == b => true,
            (Empty, Ready) | (Empty, Retired) => true,
            (Ready, Dispatched) | (Ready, Empty) | (Ready, Retired) => true,
            (Dispatched, Ready) | (Dispatched, Empty) | (Dispatched, Retired) => true,
            (Retired, Ready) | (Retired, Empty) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Ready => "ready",
            Self::Dispatched => "dispatched",
            Self::Retired => "retired",
        }
    }

    pub fn all_states() -> Vec<Self> {
        vec![Self::Empty, Self::Ready, Self::Dispatched, Self::Retired]
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

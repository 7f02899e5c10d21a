use crate::state::FetchStatus;
use crate::uri::{CandidateUri, SchedulingDirective};
use crate::url::fingerprint;
use serde::{Deserialize, Serialize};
use url::Url;

/// Whether content changed since the previous fetch of the same URI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentState {
    #[default]
    Unknown,
    Changed,
    Unchanged,
}

/// A URI admitted to the frontier and under active processing
///
/// The frontier owns a `CrawlUri` while it is queued and hands it to a worker by
/// value on dispatch; the worker gives it back with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlUri {
    pub candidate: CandidateUri,

    /// Queue this URI belongs to
    pub class_key: String,

    pub fingerprint: u64,

    /// Admission order, used to keep ordering stable across checkpoints
    pub ordinal: u64,

    pub fetch_status: FetchStatus,

    pub fetch_attempts: u32,

    /// Times this URI was put back while a prerequisite was outstanding
    pub deferrals: u32,

    pub content_state: ContentState,

    pub content_size: u64,

    /// Most recent computed revisit interval
    pub wait_interval_ms: Option<u64>,

    /// Interval the next change-driven adjustment starts from
    pub revisit_prior_ms: Option<u64>,

    /// Not dispatchable before this time (revisits only)
    pub revisit_at_ms: Option<i64>,

    /// Free-text diagnostic tags
    pub annotations: Vec<String>,

    /// Retire this URI's queue when it is finished
    pub force_retire: bool,

    /// User-agent to send instead of the crawler's own
    pub user_agent: Option<String>,
}

impl CrawlUri {
    pub fn new(candidate: CandidateUri, class_key: String, ordinal: u64) -> Self {
        let fingerprint = fingerprint(&candidate.uri);
        Self {
            candidate,
            class_key,
            fingerprint,
            ordinal,
            fetch_status: FetchStatus::Unattempted,
            fetch_attempts: 0,
            deferrals: 0,
            content_state: ContentState::Unknown,
            content_size: 0,
            wait_interval_ms: None,
            revisit_prior_ms: None,
            revisit_at_ms: None,
            annotations: Vec::new(),
            force_retire: false,
            user_agent: None,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.candidate.uri
    }

    pub fn directive(&self) -> SchedulingDirective {
        self.candidate.directive
    }

    pub fn is_prerequisite(&self) -> bool {
        self.candidate.is_prerequisite()
    }

    pub fn annotate(&mut self, note: impl Into<String>) {
        self.annotations.push(note.into());
    }

    pub fn has_annotation(&self, note: &str) -> bool {
        self.annotations.iter().any(|a| a == note)
    }

    /// Clears per-attempt state before the URI goes back on a queue
    ///
    /// Counters, annotations and revisit history survive.
    pub fn reset_for_reschedule(&mut self) {
        self.fetch_status = FetchStatus::Unattempted;
        self.content_size = 0;
        self.force_retire = false;
        self.user_agent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curi(s: &str) -> CrawlUri {
        let candidate = CandidateUri::new(Url::parse(s).unwrap());
        CrawlUri::new(candidate, "ex.com".to_string(), 1)
    }

    #[test]
    fn test_new_computes_fingerprint() {
        let c = curi("http://ex.com/a");
        assert_eq!(c.fingerprint, fingerprint(c.uri()));
        assert_eq!(c.fetch_status, FetchStatus::Unattempted);
        assert_eq!(c.content_state, ContentState::Unknown);
    }

    #[test]
    fn test_annotations() {
        let mut c = curi("http://ex.com/a");
        c.annotate("Q:server-fetchSuccesses");
        assert!(c.has_annotation("Q:server-fetchSuccesses"));
        assert!(!c.has_annotation("Q:host-totalKb"));
    }

    #[test]
    fn test_reset_for_reschedule_keeps_history() {
        let mut c = curi("http://ex.com/a");
        c.fetch_status = FetchStatus::ConnectFailed;
        c.fetch_attempts = 2;
        c.force_retire = true;
        c.user_agent = Some("bot".to_string());
        c.annotate("note");
        c.reset_for_reschedule();
        assert_eq!(c.fetch_status, FetchStatus::Unattempted);
        assert_eq!(c.fetch_attempts, 2);
        assert!(!c.force_retire);
        assert!(c.user_agent.is_none());
        assert!(c.has_annotation("note"));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut c = curi("http://ex.com/a");
        c.fetch_status = FetchStatus::Http(200);
        c.content_state = ContentState::Changed;
        c.revisit_prior_ms = Some(57_600_000);
        let json = serde_json::to_string(&c).unwrap();
        let back: CrawlUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}

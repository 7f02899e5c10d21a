//! Frontier queue manager
//!
//! This module decides what is fetched next:
//! - one politeness queue per class key, at most one URI in flight per queue
//! - a wake-time-ordered ready set choosing which queue to offer next
//! - robots.txt prerequisites, robots exclusion and quotas checked at dispatch
//! - retries, deferrals, politeness delays and adaptive revisits at completion
//!
//! All queue state sits behind one mutex. Workers call `next()` to receive a URI
//! and `finished()` to hand it back with its fetch outcome; discovered links go
//! through `schedule()`, which runs them past the dedup filter first.

mod clock;
mod persist;
mod queue;
mod report;

pub use clock::{Clock, ManualClock, SystemClock};
pub use queue::WorkQueue;
pub use report::{FrontierReport, QueueSummary};

use crate::config::{Config, FrontierConfig};
use crate::filter::{UriReceiver, UriUniqFilter};
use crate::policy::{QuotaEnforcer, WaitEvaluator, WaitPolicy};
use crate::robots::{path_query, HonoringKind, HonoringPolicy, RobotsCache, RobotsExclusionPolicy};
use crate::state::{FetchStats, FetchStatus, QueueState};
use crate::store::{open_store, FingerprintStore};
use crate::uri::{CandidateUri, ContentState, CrawlUri, Hop, SchedulingDirective};
use crate::url::{authority_key, class_key, host_key, parse_absolute, robots_uri};
use crate::{FrontierError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Longest robots.txt Crawl-delay honored, in seconds
pub const MAX_CRAWL_DELAY_SECONDS: f64 = 300.0;

/// URIs finished at dispatch time kept for `take_disposed`
const DISPOSED_BACKLOG: usize = 10_000;

/// `delay_ms` after `now_ms`, saturating at the end of time
fn later(now_ms: i64, delay_ms: u64) -> i64 {
    now_ms.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX))
}

/// Result of one fetch as reported by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub status: FetchStatus,
    pub content_size: u64,
    pub content_state: ContentState,
    pub fetch_duration_ms: u64,
    /// Response body, only needed for robots.txt
    pub body: Option<String>,
}

impl FetchOutcome {
    pub fn new(status: FetchStatus) -> Self {
        Self {
            status,
            content_size: 0,
            content_state: ContentState::Unknown,
            fetch_duration_ms: 0,
            body: None,
        }
    }

    pub fn with_size(mut self, content_size: u64) -> Self {
        self.content_size = content_size;
        self
    }

    pub fn with_content_state(mut self, content_state: ContentState) -> Self {
        self.content_state = content_state;
        self
    }

    pub fn with_duration(mut self, fetch_duration_ms: u64) -> Self {
        self.fetch_duration_ms = fetch_duration_ms;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// What the frontier did with a URI handed back by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fetched successfully and done
    Succeeded,
    /// Fetched successfully and queued again for a later revisit
    Revisit { at_ms: i64 },
    /// Put back on its queue for another attempt
    Retried,
    /// Put back on its queue while a prerequisite resolves
    Deferred,
    /// Terminally failed
    Failed,
    /// Finished by policy or operator without counting as a failure
    Disregarded,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Revisit { at_ms } => write!(f, "revisit at {}", at_ms),
            Self::Retried => write!(f, "retried"),
            Self::Deferred => write!(f, "deferred"),
            Self::Failed => write!(f, "failed"),
            Self::Disregarded => write!(f, "disregarded"),
        }
    }
}

/// Running totals across the whole frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierTotals {
    pub admitted: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub disregarded: u64,
    pub retried: u64,
    pub deferred: u64,
    pub revisits: u64,
}

/// Immutable settings resolved from the configuration
#[derive(Debug)]
struct Settings {
    frontier: FrontierConfig,
    quotas: QuotaEnforcer,
    wait: WaitEvaluator,
    revisit_enabled: bool,
    honoring: HonoringPolicy,
    custom_policy: Option<Arc<RobotsExclusionPolicy>>,
    user_agent: String,
}

impl Settings {
    fn from_config(config: &Config) -> Self {
        let honoring = HonoringPolicy::from_config(&config.robots);
        let custom_policy = match (honoring.kind, &honoring.custom_robots) {
            (HonoringKind::Custom, Some(text)) => {
                Some(Arc::new(RobotsExclusionPolicy::parse(text)))
            }
            _ => None,
        };
        Self {
            frontier: config.frontier.clone(),
            quotas: QuotaEnforcer::new(config.quotas.clone()),
            wait: WaitEvaluator::new(WaitPolicy::from_config(&config.revisit)),
            revisit_enabled: config.revisit.enabled,
            honoring,
            custom_policy,
            user_agent: config.user_agent.header_value(),
        }
    }

    /// Delay after a fetch: a multiple of its duration, clamped, then raised to
    /// the robots Crawl-delay when that is honored
    fn politeness_delay_ms(&self, fetch_duration_ms: u64, crawl_delay: Option<f64>) -> u64 {
        let f = &self.frontier;
        let scaled = (fetch_duration_ms as f64 * f.delay_factor).round() as u64;
        let mut delay = scaled.clamp(f.min_delay_ms, f.max_delay_ms.max(f.min_delay_ms));
        if f.respect_crawl_delay {
            if let Some(seconds) = crawl_delay {
                let capped = seconds.min(MAX_CRAWL_DELAY_SECONDS);
                delay = delay.max((capped * 1000.0).round() as u64);
            }
        }
        delay
    }
}

/// Queue state guarded by the frontier mutex
#[derive(Debug, Default)]
struct FrontierState {
    queues: HashMap<String, WorkQueue>,
    /// (eligible at, sequence, class key) for every dispatchable queue
    ready: BTreeSet<(i64, u64, String)>,
    ready_seq: u64,
    server_stats: HashMap<String, Arc<FetchStats>>,
    host_stats: HashMap<String, Arc<FetchStats>>,
    /// Copy of each dispatched URI, by class key
    in_flight: HashMap<String, CrawlUri>,
    /// Authorities with a robots.txt prerequisite scheduled or in flight
    robots_pending: HashSet<String>,
    disposed: VecDeque<CrawlUri>,
    totals: FrontierTotals,
    next_ordinal: u64,
    paused: bool,
}

impl FrontierState {
    /// Re-files a queue in the ready set after anything about it changed
    fn refresh(&mut self, key: &str) {
        let Some(queue) = self.queues.get_mut(key) else {
            return;
        };
        if let Some((at, seq)) = queue.ready_entry.take() {
            self.ready.remove(&(at, seq, key.to_string()));
        }
        if matches!(queue.state, QueueState::Empty | QueueState::Ready) {
            queue.state = if queue.is_empty() {
                QueueState::Empty
            } else {
                QueueState::Ready
            };
        }
        if queue.state != QueueState::Ready || queue.awaiting_prerequisite {
            return;
        }
        if let Some(at) = queue.eligible_at() {
            self.ready_seq += 1;
            self.ready.insert((at, self.ready_seq, key.to_string()));
            queue.ready_entry = Some((at, self.ready_seq));
        }
    }

    fn server_stats(&mut self, server: &str) -> Arc<FetchStats> {
        Arc::clone(self.server_stats.entry(server.to_string()).or_default())
    }

    fn host_stats(&mut self, host: &str) -> Arc<FetchStats> {
        Arc::clone(self.host_stats.entry(host.to_string()).or_default())
    }

    fn queued(&self) -> usize {
        self.queues.values().map(WorkQueue::len).sum()
    }

    fn next_wake(&self) -> Option<i64> {
        self.ready.first().map(|(at, _, _)| *at)
    }

    /// Records a URI finished without being fetched
    fn dispose(&mut self, curi: CrawlUri) {
        if curi.fetch_status.is_disregarded() {
            self.totals.disregarded += 1;
        } else {
            self.totals.failed += 1;
        }
        debug!(uri = %curi.uri(), status = %curi.fetch_status, "Finished without fetch");
        if self.disposed.len() == DISPOSED_BACKLOG {
            self.disposed.pop_front();
        }
        self.disposed.push_back(curi);
    }
}

/// Outcome of the dispatch-time checks
enum Admission {
    Dispatch,
    Defer,
    Dispose,
    /// Dispose and retire the queue
    Retire,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<FrontierState>,
    notify: Notify,
    settings: Settings,
    robots: RobotsCache,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Files a deduplicated candidate on its queue
    fn admit(&self, state: &mut FrontierState, mut candidate: CandidateUri) {
        let key = match class_key(&candidate.uri, self.settings.frontier.queue_assignment) {
            Ok(key) => key,
            Err(e) => {
                warn!(uri = %candidate.uri, error = %e, "Dropping URI without a class key");
                return;
            }
        };

        if candidate.is_prerequisite() {
            candidate.directive = SchedulingDirective::Expedite;
        } else {
            let hops = candidate.trailing_non_link_hops();
            let preferred = self.settings.frontier.preference_embed_hops as usize;
            if hops > 0 && hops <= preferred {
                candidate.directive = candidate.directive.at_least(SchedulingDirective::Soon);
            }
        }

        let ordinal = state.next_ordinal;
        state.next_ordinal += 1;
        let curi = CrawlUri::new(candidate, key.clone(), ordinal);

        let queue = state
            .queues
            .entry(key.clone())
            .or_insert_with(|| WorkQueue::new(key.clone()));
        if let Ok(server) = authority_key(curi.uri()) {
            queue.servers.insert(server);
        }
        if let Ok(host) = host_key(curi.uri()) {
            queue.hosts.insert(host);
        }
        if curi.is_prerequisite() {
            queue.enqueue_front(curi);
            queue.awaiting_prerequisite = false;
        } else {
            queue.enqueue(curi);
        }
        state.totals.admitted += 1;
        state.refresh(&key);
    }

    /// Hands out the next eligible URI, finishing any that fail admission
    fn select(
        &self,
        state: &mut FrontierState,
        now_ms: i64,
        prerequisites: &mut Vec<CandidateUri>,
    ) -> Result<Option<CrawlUri>> {
        if state.paused {
            return Ok(None);
        }
        loop {
            match state.ready.first() {
                Some((at, _, _)) if *at <= now_ms => {}
                _ => return Ok(None),
            }
            let Some((_, _, key)) = state.ready.pop_first() else {
                return Ok(None);
            };
            let Some(mut queue) = state.queues.remove(&key) else {
                continue;
            };
            queue.ready_entry = None;

            let Some(mut curi) = queue.pop_next(now_ms) else {
                state.queues.insert(key.clone(), queue);
                state.refresh(&key);
                continue;
            };

            match self.check_admission(state, &mut queue, &mut curi, now_ms, prerequisites) {
                Admission::Dispatch => {
                    if let Err(e) = queue.transition(QueueState::Dispatched) {
                        queue.enqueue_front(curi);
                        state.queues.insert(key.clone(), queue);
                        state.refresh(&key);
                        return Err(e);
                    }
                    curi.fetch_attempts += 1;
                    state.in_flight.insert(key.clone(), curi.clone());
                    state.totals.dispatched += 1;
                    state.queues.insert(key.clone(), queue);
                    state.refresh(&key);
                    debug!(uri = %curi.uri(), class_key = %key, "Dispatched");
                    return Ok(Some(curi));
                }
                Admission::Defer => {
                    curi.reset_for_reschedule();
                    queue.enqueue_front(curi);
                    state.totals.deferred += 1;
                }
                Admission::Dispose => state.dispose(curi),
                Admission::Retire => {
                    state.dispose(curi);
                    if let Err(e) = queue.transition(QueueState::Retired) {
                        state.queues.insert(key.clone(), queue);
                        state.refresh(&key);
                        return Err(e);
                    }
                    info!(class_key = %key, "Queue retired by quota");
                }
            }
            state.queues.insert(key.clone(), queue);
            state.refresh(&key);
        }
    }

    fn check_admission(
        &self,
        state: &mut FrontierState,
        queue: &mut WorkQueue,
        curi: &mut CrawlUri,
        now_ms: i64,
        prerequisites: &mut Vec<CandidateUri>,
    ) -> Admission {
        if curi.is_prerequisite() {
            return Admission::Dispatch;
        }
        let (authority, host) = match (authority_key(curi.uri()), host_key(curi.uri())) {
            (Ok(authority), Ok(host)) => (authority, host),
            _ => {
                curi.fetch_status = FetchStatus::RuntimeError;
                return Admission::Dispose;
            }
        };

        if self.settings.honoring.kind != HonoringKind::Ignore {
            let policy = match &self.settings.custom_policy {
                Some(policy) => Some(Arc::clone(policy)),
                None => self.robots.get(&authority, now_ms),
            };
            let Some(policy) = policy else {
                if self.robots.is_expired(&authority, now_ms) {
                    debug!(authority = %authority, "robots.txt expired");
                }
                return self.defer_for_robots(state, queue, curi, &authority, prerequisites);
            };
            let verdict = policy.evaluate(
                &path_query(curi.uri()),
                &self.settings.user_agent,
                &self.settings.honoring,
            );
            if verdict.disallowed {
                curi.fetch_status = FetchStatus::RobotsPrecluded;
                return Admission::Dispose;
            }
            if let Some(agent) = verdict.masquerade_agent(&self.settings.honoring) {
                curi.user_agent = Some(agent.to_string());
            }
        }

        if !self.settings.quotas.is_active() {
            return Admission::Dispatch;
        }
        let server = state.server_stats(&authority);
        let host = state.host_stats(&host);
        if self
            .settings
            .quotas
            .check_quotas(curi, &server, &host, &queue.stats)
        {
            return if curi.force_retire {
                Admission::Retire
            } else {
                Admission::Dispose
            };
        }
        Admission::Dispatch
    }

    fn defer_for_robots(
        &self,
        state: &mut FrontierState,
        queue: &mut WorkQueue,
        curi: &mut CrawlUri,
        authority: &str,
        prerequisites: &mut Vec<CandidateUri>,
    ) -> Admission {
        curi.deferrals += 1;
        if curi.deferrals > self.settings.frontier.max_deferrals {
            curi.fetch_status = FetchStatus::PrerequisiteFailure;
            return Admission::Dispose;
        }
        curi.fetch_status = FetchStatus::Deferred;
        if !state.robots_pending.contains(authority) {
            match robots_uri(curi.uri()) {
                Ok(uri) => {
                    debug!(authority, "Scheduling robots.txt prerequisite");
                    prerequisites.push(
                        CandidateUri::discovered(uri, &curi.candidate, Hop::Prerequisite)
                            .with_directive(SchedulingDirective::Expedite),
                    );
                    state.robots_pending.insert(authority.to_string());
                    queue.awaiting_prerequisite = true;
                }
                Err(e) => {
                    warn!(authority, error = %e, "Cannot build robots.txt URI");
                    curi.fetch_status = FetchStatus::PrerequisiteFailure;
                    return Admission::Dispose;
                }
            }
        }
        Admission::Defer
    }

    /// Applies a worker's outcome to a dispatched URI and settles its queue
    fn complete(
        &self,
        state: &mut FrontierState,
        mut curi: CrawlUri,
        outcome: FetchOutcome,
        now_ms: i64,
    ) -> Result<Disposition> {
        let key = curi.class_key.clone();
        match state.in_flight.get(&key) {
            Some(dispatched) if dispatched.fingerprint == curi.fingerprint => {}
            _ => return Err(FrontierError::NotInFlight(curi.uri().to_string())),
        }
        let Some(mut queue) = state.queues.remove(&key) else {
            return Err(FrontierError::UnknownQueue(key));
        };
        state.in_flight.remove(&key);

        let status = outcome.status;
        curi.fetch_status = status;
        curi.content_size = outcome.content_size;
        curi.content_state = outcome.content_state;

        let authority = authority_key(curi.uri()).ok();
        if let Some(server) = &authority {
            state.server_stats(server).tally(status, outcome.content_size);
        }
        if let Ok(host) = host_key(curi.uri()) {
            state.host_stats(&host).tally(status, outcome.content_size);
        }
        queue.stats.tally(status, outcome.content_size);

        let robots_for = authority
            .clone()
            .filter(|_| curi.is_prerequisite() && curi.uri().path() == "/robots.txt");
        if let Some(server) = &robots_for {
            if let Some(policy) = RobotsExclusionPolicy::from_fetch(status, outcome.body.as_deref())
            {
                if let RobotsExclusionPolicy::Normal(rules) = &policy {
                    if rules.has_errors() {
                        warn!(authority = %server, "robots.txt has rules outside any User-agent section");
                    }
                    debug!(
                        authority = %server,
                        agents = ?rules.user_agents().collect::<Vec<_>>(),
                        "robots.txt sections"
                    );
                }
                info!(authority = %server, status = %status, "robots.txt updated");
                self.robots.insert(server, policy, now_ms);
            }
        }
        queue.awaiting_prerequisite = false;

        let mut wake_ms = queue.wake_time_ms;
        if status.is_response() {
            let crawl_delay = match &self.settings.custom_policy {
                Some(policy) => policy.crawl_delay(&self.settings.user_agent),
                None => authority
                    .as_deref()
                    .and_then(|server| self.robots.get(server, now_ms))
                    .and_then(|policy| policy.crawl_delay(&self.settings.user_agent)),
            };
            let delay = self
                .settings
                .politeness_delay_ms(outcome.fetch_duration_ms, crawl_delay);
            wake_ms = wake_ms.max(later(now_ms, delay));
        }

        let force_retire = curi.force_retire;
        let frontier = &self.settings.frontier;
        let disposition = if status.is_success() {
            state.totals.succeeded += 1;
            match self.settings.wait.evaluate(&mut curi) {
                Some(wait) if self.settings.revisit_enabled && !curi.is_prerequisite() => {
                    let at_ms = later(now_ms, wait);
                    curi.reset_for_reschedule();
                    curi.fetch_attempts = 0;
                    curi.revisit_at_ms = Some(at_ms);
                    queue.enqueue(curi);
                    state.totals.revisits += 1;
                    Disposition::Revisit { at_ms }
                }
                _ => Disposition::Succeeded,
            }
        } else if status == FetchStatus::Deferred {
            curi.deferrals += 1;
            if curi.deferrals > frontier.max_deferrals {
                curi.fetch_status = FetchStatus::PrerequisiteFailure;
                state.totals.failed += 1;
                Disposition::Failed
            } else {
                curi.reset_for_reschedule();
                queue.enqueue_front(curi);
                state.totals.deferred += 1;
                Disposition::Deferred
            }
        } else if status.needs_retry() {
            if curi.fetch_attempts < frontier.max_retries {
                if status.needs_retry_delay() {
                    let retry_ms = frontier.retry_delay_seconds.saturating_mul(1000);
                    wake_ms = wake_ms.max(later(now_ms, retry_ms));
                }
                curi.reset_for_reschedule();
                queue.enqueue_front(curi);
                state.totals.retried += 1;
                Disposition::Retried
            } else {
                curi.fetch_status = FetchStatus::TooManyRetries;
                state.totals.failed += 1;
                Disposition::Failed
            }
        } else if status.is_disregarded() {
            state.totals.disregarded += 1;
            Disposition::Disregarded
        } else {
            state.totals.failed += 1;
            Disposition::Failed
        };
        queue.wake_time_ms = wake_ms;

        // a robots.txt put back on its queue is still the pending prerequisite
        if let Some(server) = &robots_for {
            if !matches!(disposition, Disposition::Retried | Disposition::Deferred) {
                state.robots_pending.remove(server);
            }
        }

        let retire = force_retire || queue.retire_requested;
        queue.retire_requested = false;
        let next = if retire {
            QueueState::Retired
        } else if queue.is_empty() {
            QueueState::Empty
        } else {
            QueueState::Ready
        };
        let moved = queue.transition(next);
        state.queues.insert(key.clone(), queue);
        state.refresh(&key);
        moved?;

        if retire {
            info!(class_key = %key, "Queue retired");
        }
        debug!(class_key = %key, status = %status, disposition = %disposition, "Finished");
        Ok(disposition)
    }
}

impl UriReceiver for Shared {
    fn receive(&self, candidate: CandidateUri) {
        {
            let mut state = self.lock();
            self.admit(&mut state, candidate);
        }
        self.notify.notify_waiters();
    }
}

/// The frontier: dedup filter plus politeness queues
#[derive(Debug)]
pub struct Frontier {
    shared: Arc<Shared>,
    filter: Arc<UriUniqFilter>,
}

impl Frontier {
    /// Creates a frontier over the given fingerprint store, using wall-clock time
    pub fn new(config: &Config, store: Box<dyn FingerprintStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        store: Box<dyn FingerprintStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::assemble(config, UriUniqFilter::new(store), clock)
    }

    /// Creates a frontier with the store the configuration selects
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.fingerprints)?;
        Ok(Self::new(config, store))
    }

    fn assemble(config: &Config, filter: UriUniqFilter, clock: Arc<dyn Clock>) -> Self {
        let validity = i64::try_from(config.robots.validity_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX);
        let shared = Arc::new(Shared {
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
            settings: Settings::from_config(config),
            robots: RobotsCache::new(validity),
            clock,
        });
        let filter = Arc::new(filter);
        filter.set_receiver(shared.clone());
        Self { shared, filter }
    }

    pub fn filter(&self) -> &Arc<UriUniqFilter> {
        &self.filter
    }

    pub fn robots(&self) -> &RobotsCache {
        &self.shared.robots
    }

    pub fn now_ms(&self) -> i64 {
        self.shared.clock.now_ms()
    }

    /// Offers a discovered URI; returns true if it was new and got queued
    pub fn schedule(&self, candidate: CandidateUri) -> Result<bool> {
        Ok(self.filter.add(candidate)?)
    }

    /// Parses and schedules seed URIs, returning how many were new
    pub fn schedule_seeds<S: AsRef<str>>(&self, seeds: &[S]) -> Result<usize> {
        let mut added = 0;
        for seed in seeds {
            let uri = parse_absolute(seed.as_ref())?;
            if self.schedule(CandidateUri::seed(uri))? {
                added += 1;
            }
        }
        info!(seeds = seeds.len(), added, "Seeds scheduled");
        Ok(added)
    }

    /// Returns the next URI to fetch if one is eligible now
    pub fn try_next(&self) -> Result<Option<CrawlUri>> {
        self.try_next_at(self.now_ms())
    }

    /// Returns the next URI eligible at `now_ms`
    ///
    /// URIs that fail admission (robots, quota, prerequisite ceiling) are finished
    /// on the spot and can be collected with `take_disposed`.
    pub fn try_next_at(&self, now_ms: i64) -> Result<Option<CrawlUri>> {
        loop {
            let mut prerequisites = Vec::new();
            let result = {
                let mut state = self.shared.lock();
                self.shared.select(&mut state, now_ms, &mut prerequisites)
            };
            let scheduled = !prerequisites.is_empty();
            // Prerequisites bypass dedup so an expired robots.txt is fetched again.
            for candidate in prerequisites {
                self.filter.add_force(candidate);
            }
            match result {
                Ok(None) if scheduled => continue,
                other => return other,
            }
        }
    }

    /// Waits for the next URI to fetch
    ///
    /// Returns None when nothing is queued or in flight, or when no queue became
    /// eligible within `max-poll-ms`.
    pub async fn next(&self) -> Result<Option<CrawlUri>> {
        let max_poll = self.shared.settings.frontier.max_poll_ms;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(max_poll);
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(curi) = self.try_next()? {
                return Ok(Some(curi));
            }

            let (done, next_wake, paused) = {
                let state = self.shared.lock();
                (
                    state.queued() == 0 && state.in_flight.is_empty(),
                    state.next_wake(),
                    state.paused,
                )
            };
            if done && !paused {
                return Ok(None);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let mut sleep_for = deadline - now;
            if let (Some(wake), false) = (next_wake, paused) {
                let until_wake = (wake - self.now_ms()).max(1) as u64;
                sleep_for = sleep_for.min(Duration::from_millis(until_wake));
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    /// Hands a dispatched URI back with its fetch outcome
    pub fn finished(&self, curi: CrawlUri, outcome: FetchOutcome) -> Result<Disposition> {
        self.finished_at(curi, outcome, self.now_ms())
    }

    pub fn finished_at(
        &self,
        curi: CrawlUri,
        outcome: FetchOutcome,
        now_ms: i64,
    ) -> Result<Disposition> {
        let disposition = {
            let mut state = self.shared.lock();
            self.shared.complete(&mut state, curi, outcome, now_ms)?
        };
        self.shared.notify.notify_waiters();
        Ok(disposition)
    }

    /// Withdraws a queue from scheduling
    ///
    /// A URI already in flight completes normally; the queue retires when it does.
    pub fn retire_queue(&self, class_key: &str) -> Result<()> {
        let mut state = self.shared.lock();
        let queue = state
            .queues
            .get_mut(class_key)
            .ok_or_else(|| FrontierError::UnknownQueue(class_key.to_string()))?;
        if queue.state == QueueState::Dispatched {
            queue.retire_requested = true;
        } else {
            queue.transition(QueueState::Retired)?;
        }
        state.refresh(class_key);
        info!(class_key, "Queue retired by operator");
        Ok(())
    }

    /// Returns a retired queue to scheduling
    ///
    /// With `reset_stats`, the queue's counters and those of every server and host
    /// it has served are zeroed so quotas stop blocking.
    pub fn reinstate_queue(&self, class_key: &str, reset_stats: bool) -> Result<()> {
        {
            let mut state = self.shared.lock();
            let state = &mut *state;
            let queue = state
                .queues
                .get_mut(class_key)
                .ok_or_else(|| FrontierError::UnknownQueue(class_key.to_string()))?;
            queue.retire_requested = false;
            if queue.state == QueueState::Retired {
                let next = if queue.is_empty() {
                    QueueState::Empty
                } else {
                    QueueState::Ready
                };
                queue.transition(next)?;
            }
            if reset_stats {
                queue.stats.reset();
                for server in &queue.servers {
                    if let Some(stats) = state.server_stats.get(server) {
                        stats.reset();
                    }
                }
                for host in &queue.hosts {
                    if let Some(stats) = state.host_stats.get(host) {
                        stats.reset();
                    }
                }
            }
            state.refresh(class_key);
            info!(class_key, reset_stats, "Queue reinstated");
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Deletes pending URIs matching `uri_pattern` from queues matching
    /// `queue_pattern` (all queues when None)
    ///
    /// Deleted URIs finish as `DeletedByUser`. Returns how many were deleted.
    pub fn delete_matching(&self, queue_pattern: Option<&str>, uri_pattern: &str) -> Result<usize> {
        let queue_re = queue_pattern.map(Regex::new).transpose()?;
        let uri_re = Regex::new(uri_pattern)?;

        let mut state = self.shared.lock();
        let keys: Vec<String> = state
            .queues
            .keys()
            .filter(|key| queue_re.as_ref().map_or(true, |re| re.is_match(key)))
            .cloned()
            .collect();

        let mut deleted = 0;
        for key in keys {
            let removed = match state.queues.get_mut(&key) {
                Some(queue) => queue.remove_matching(|curi| uri_re.is_match(curi.uri().as_str())),
                None => continue,
            };
            deleted += removed.len();
            for mut curi in removed {
                curi.fetch_status = FetchStatus::DeletedByUser;
                state.dispose(curi);
            }
            state.refresh(&key);
        }
        info!(uri_pattern, deleted, "Deleted matching URIs");
        Ok(deleted)
    }

    /// Stops handing out URIs; completions are still accepted
    pub fn pause(&self) {
        self.shared.lock().paused = true;
        info!("Frontier paused");
    }

    pub fn resume(&self) {
        self.shared.lock().paused = false;
        info!("Frontier resumed");
        self.shared.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    /// Drains URIs finished at dispatch time without a fetch
    pub fn take_disposed(&self) -> Vec<CrawlUri> {
        self.shared.lock().disposed.drain(..).collect()
    }

    pub fn queue_state(&self, class_key: &str) -> Option<QueueState> {
        self.shared.lock().queues.get(class_key).map(WorkQueue::state)
    }

    pub fn queue_wake_time(&self, class_key: &str) -> Option<i64> {
        self.shared
            .lock()
            .queues
            .get(class_key)
            .map(WorkQueue::wake_time_ms)
    }

    /// URIs waiting on queues, revisits included
    pub fn queued_count(&self) -> usize {
        self.shared.lock().queued()
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.lock().in_flight.len()
    }

    /// True when nothing is queued and nothing is in flight
    pub fn is_finished(&self) -> bool {
        let state = self.shared.lock();
        state.queued() == 0 && state.in_flight.is_empty()
    }

    pub fn totals(&self) -> FrontierTotals {
        self.shared.lock().totals
    }
}

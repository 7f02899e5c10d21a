//! Capturing and restoring the queue graph for checkpoints

use super::{Frontier, FrontierState, WorkQueue};
use crate::checkpoint::{FrontierSnapshot, QueueSnapshot, SNAPSHOT_VERSION};
use crate::state::{FetchStats, QueueState};
use crate::store::{StoreDescriptor, StoreResult};
use crate::url::authority_key;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

impl Frontier {
    /// Snapshots the frontier and writes the fingerprint store into `dir`
    ///
    /// No URI is admitted from before the queue graph is copied until the store
    /// has been written, so every stored fingerprint is either queued, in flight
    /// or finished in the snapshot. The frontier lock is held only while the graph
    /// is copied; dispatch and completion continue while the store is written.
    pub(crate) fn capture(
        &self,
        dir: &Path,
        config_hash: Option<String>,
    ) -> StoreResult<FrontierSnapshot> {
        let (assemble, store) = self
            .filter
            .checkpoint_with(dir, || self.snapshot_graph(config_hash))?;
        Ok(assemble(store))
    }

    /// Copies the queue graph; the returned closure completes the snapshot once
    /// the store has been written
    fn snapshot_graph(
        &self,
        config_hash: Option<String>,
    ) -> impl FnOnce(StoreDescriptor) -> FrontierSnapshot {
        let state = self.shared.lock();

        let mut queues: Vec<QueueSnapshot> = state
            .queues
            .values()
            .map(|queue| QueueSnapshot {
                class_key: queue.class_key().to_string(),
                state: queue.state(),
                wake_time_ms: queue.wake_time_ms(),
                retire_requested: queue.retire_requested,
                stats: queue.stats.snapshot(),
                servers: queue.servers.iter().cloned().collect(),
                hosts: queue.hosts.iter().cloned().collect(),
                pending: queue.pending().cloned().collect(),
            })
            .collect();
        queues.sort_by(|a, b| a.class_key.cmp(&b.class_key));

        let mut in_flight: Vec<_> = state.in_flight.values().cloned().collect();
        in_flight.sort_by_key(|curi| curi.ordinal);

        let server_stats: BTreeMap<_, _> = state
            .server_stats
            .iter()
            .map(|(k, v)| (k.clone(), v.snapshot()))
            .collect();
        let host_stats: BTreeMap<_, _> = state
            .host_stats
            .iter()
            .map(|(k, v)| (k.clone(), v.snapshot()))
            .collect();
        let robots = self.shared.robots.snapshot();
        let filter = self.filter.stats();
        let (totals, next_ordinal, paused) = (state.totals, state.next_ordinal, state.paused);
        drop(state);

        move |store| FrontierSnapshot {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            config_hash,
            queues,
            in_flight,
            server_stats,
            host_stats,
            robots,
            totals,
            filter,
            next_ordinal,
            paused,
            store,
        }
    }

    /// Replaces all queue state with a snapshot's
    ///
    /// In-flight URIs go back to the head of their queue with the interrupted
    /// attempt uncounted. The fingerprint store is not touched.
    pub(crate) fn restore(&self, snapshot: FrontierSnapshot) {
        let in_flight = snapshot.in_flight.len();
        {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            *state = FrontierState::default();

            for q in snapshot.queues {
                let mut queue = WorkQueue::new(q.class_key.clone());
                queue.wake_time_ms = q.wake_time_ms;
                queue.stats = Arc::new(FetchStats::from_snapshot(&q.stats));
                queue.servers = q.servers.into_iter().collect();
                queue.hosts = q.hosts.into_iter().collect();
                for curi in q.pending {
                    queue.enqueue(curi);
                }
                queue.state = match q.state {
                    QueueState::Retired => QueueState::Retired,
                    QueueState::Dispatched if q.retire_requested => QueueState::Retired,
                    _ => QueueState::Empty,
                };
                state.queues.insert(q.class_key, queue);
            }

            for mut curi in snapshot.in_flight {
                curi.reset_for_reschedule();
                curi.fetch_attempts = curi.fetch_attempts.saturating_sub(1);
                let key = curi.class_key.clone();
                state
                    .queues
                    .entry(key.clone())
                    .or_insert_with(|| WorkQueue::new(key))
                    .enqueue_front(curi);
            }

            for queue in state.queues.values() {
                for curi in queue.pending().filter(|curi| curi.is_prerequisite()) {
                    if let Ok(authority) = authority_key(curi.uri()) {
                        state.robots_pending.insert(authority);
                    }
                }
            }

            state.server_stats = snapshot
                .server_stats
                .iter()
                .map(|(k, v)| (k.clone(), Arc::new(FetchStats::from_snapshot(v))))
                .collect();
            state.host_stats = snapshot
                .host_stats
                .iter()
                .map(|(k, v)| (k.clone(), Arc::new(FetchStats::from_snapshot(v))))
                .collect();
            state.totals = snapshot.totals;
            state.next_ordinal = snapshot.next_ordinal;
            state.paused = snapshot.paused;

            let keys: Vec<String> = state.queues.keys().cloned().collect();
            for key in keys {
                state.refresh(&key);
            }
            info!(
                queues = state.queues.len(),
                queued = state.queued(),
                in_flight,
                "Frontier restored"
            );
        }
        self.shared.robots.restore(snapshot.robots);
        self.filter.restore_stats(&snapshot.filter);
        self.shared.notify.notify_waiters();
    }
}

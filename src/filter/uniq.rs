use crate::store::{FingerprintStore, StoreDescriptor, StoreResult};
use crate::uri::CandidateUri;
use crate::url::fingerprint;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, trace};
use url::Url;

/// Destination for URIs that pass the filter
pub trait UriReceiver: Send + Sync {
    fn receive(&self, candidate: CandidateUri);
}

/// Counters describing filter traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Candidates forwarded because their fingerprint was new
    pub added: u64,
    /// Candidates dropped as already seen
    pub duplicates: u64,
    /// Candidates forwarded by `add_force`
    pub forced: u64,
}

/// Deduplicating entry point for discovered URIs
///
/// The store's test-and-insert runs under one mutex, so among any number of
/// concurrent `add` calls for the same fingerprint exactly one sees it as new and
/// forwards it. The receiver is called with the store lock still held: a URI is
/// never in the store without also having reached the receiver. Receivers must
/// not call back into the store.
pub struct UriUniqFilter {
    store: Mutex<Box<dyn FingerprintStore>>,
    receiver: RwLock<Option<Arc<dyn UriReceiver>>>,
    added: AtomicU64,
    duplicates: AtomicU64,
    forced: AtomicU64,
}

impl UriUniqFilter {
    pub fn new(store: Box<dyn FingerprintStore>) -> Self {
        Self {
            store: Mutex::new(store),
            receiver: RwLock::new(None),
            added: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            forced: AtomicU64::new(0),
        }
    }

    /// Registers where novel URIs are forwarded
    pub fn set_receiver(&self, receiver: Arc<dyn UriReceiver>) {
        let mut slot = self
            .receiver
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(receiver);
    }

    /// Offers a candidate; forwards it iff its fingerprint was not yet seen
    ///
    /// Returns true if the candidate was new.
    pub fn add(&self, candidate: CandidateUri) -> StoreResult<bool> {
        let fp = fingerprint(&candidate.uri);
        let mut store = self.store();
        let novel = store.add(fp)?;
        if novel {
            self.added.fetch_add(1, Ordering::Relaxed);
            self.forward(candidate);
        } else {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            trace!(uri = %candidate.uri, "Already seen");
        }
        drop(store);
        Ok(novel)
    }

    /// Forwards a candidate without consulting or updating the store
    ///
    /// Used for refetches that must bypass dedup, such as an expired robots.txt.
    pub fn add_force(&self, candidate: CandidateUri) {
        self.forced.fetch_add(1, Ordering::Relaxed);
        debug!(uri = %candidate.uri, "Forced past dedup");
        self.forward(candidate);
    }

    /// Marks a URI as seen without forwarding it
    pub fn note(&self, uri: &Url) -> StoreResult<bool> {
        self.note_fingerprint(fingerprint(uri))
    }

    pub fn note_fingerprint(&self, fp: u64) -> StoreResult<bool> {
        self.store().add(fp)
    }

    /// Forgets a URI so it may be discovered again
    pub fn forget(&self, uri: &Url) -> StoreResult<bool> {
        self.store().remove(fingerprint(uri))
    }

    pub fn contains(&self, uri: &Url) -> StoreResult<bool> {
        self.store().contains(fingerprint(uri))
    }

    /// Number of fingerprints held
    pub fn count(&self) -> u64 {
        self.store().size()
    }

    pub fn stats(&self) -> FilterStats {
        FilterStats {
            added: self.added.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            forced: self.forced.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn restore_stats(&self, stats: &FilterStats) {
        self.added.store(stats.added, Ordering::Relaxed);
        self.duplicates.store(stats.duplicates, Ordering::Relaxed);
        self.forced.store(stats.forced, Ordering::Relaxed);
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.store().flush()
    }

    /// Writes the store into `dir`
    pub fn checkpoint(&self, dir: &Path) -> StoreResult<StoreDescriptor> {
        self.store().checkpoint(dir)
    }

    /// Runs `capture`, then writes the store into `dir`, with no `add` in between
    ///
    /// The store lock is held across both steps, so whatever `capture` records
    /// about forwarded URIs agrees with the written store.
    pub fn checkpoint_with<T>(
        &self,
        dir: &Path,
        capture: impl FnOnce() -> T,
    ) -> StoreResult<(T, StoreDescriptor)> {
        let mut store = self.store();
        let captured = capture();
        let descriptor = store.checkpoint(dir)?;
        Ok((captured, descriptor))
    }

    fn forward(&self, candidate: CandidateUri) {
        let receiver = self
            .receiver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match receiver {
            Some(receiver) => receiver.receive(candidate),
            None => debug!(uri = %candidate.uri, "No receiver registered; dropping"),
        }
    }

    // A panic mid-insert cannot leave the table half-updated in a way that breaks
    // membership, so a poisoned lock is still usable.
    fn store(&self) -> MutexGuard<'_, Box<dyn FingerprintStore>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for UriUniqFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UriUniqFilter")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

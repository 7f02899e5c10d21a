//! Fingerprint store trait and error types
//!
//! This module defines the interface shared by every fingerprint store strategy
//! and the descriptor a store leaves behind in a checkpoint.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during fingerprint store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt fingerprint store: {0}")]
    Corrupt(String),

    #[error("Fingerprint table cannot grow beyond 2^{0} slots")]
    CapacityExhausted(u32),
}

/// Result type for fingerprint store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// How a store describes itself inside a checkpoint directory
///
/// `dump` names are relative to the checkpoint directory so the directory can be
/// moved as a whole before recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StoreDescriptor {
    Memory {
        capacity_bits: u32,
        dump: String,
    },
    Cache {
        capacity_bits: u32,
        max_entries: u64,
        dump: String,
    },
    Disk {
        path: PathBuf,
        dump: String,
    },
}

/// Exact-membership set of 64-bit fingerprints
///
/// Lookups take `&mut self` because some strategies touch state on every probe
/// (file position for the disk store, slot heat for the bounded cache). Callers
/// that share a store across threads wrap it in a mutex; no implementation locks
/// internally.
pub trait FingerprintStore: Send {
    /// Returns true if the fingerprint is present
    fn contains(&mut self, fp: u64) -> StoreResult<bool>;

    /// Inserts the fingerprint, returning true iff it was not already present
    fn add(&mut self, fp: u64) -> StoreResult<bool>;

    /// Removes the fingerprint, returning true iff it was present
    fn remove(&mut self, fp: u64) -> StoreResult<bool>;

    /// Number of fingerprints currently held
    fn size(&self) -> u64;

    /// Pushes any buffered state to durable storage
    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// Writes this store's contents into `dir` and describes how to rebuild it
    fn checkpoint(&mut self, dir: &Path) -> StoreResult<StoreDescriptor>;
}

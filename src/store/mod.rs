//! Fingerprint stores
//!
//! This module provides the exact-membership set the dedup filter relies on, in
//! three interchangeable strategies:
//!
//! - `MemoryFingerprintStore`: flat in-memory table
//! - `DiskFingerprintStore`: the same table in a random-access file
//! - `CacheFingerprintStore`: in-memory table that evicts cold entries past a ceiling
//!
//! All three share the open-addressing algorithm in `table`.

mod cache;
mod disk;
mod memory;
pub mod table;
mod traits;

pub use cache::CacheFingerprintStore;
pub use disk::{DiskFingerprintStore, DISK_DUMP};
pub use memory::{MemoryFingerprintStore, MEMORY_DUMP};
pub use traits::{FingerprintStore, StoreDescriptor, StoreError, StoreResult};

use crate::config::{FingerprintConfig, StoreKind};
use std::fs;
use std::path::Path;
use tracing::info;

/// Builds the store selected by the configuration
///
/// A disk store reopens its file when one already exists at the configured path.
pub fn open_store(config: &FingerprintConfig) -> StoreResult<Box<dyn FingerprintStore>> {
    let store: Box<dyn FingerprintStore> = match config.store {
        StoreKind::Memory => Box::new(MemoryFingerprintStore::new(config.capacity_bits)),
        StoreKind::Cache => Box::new(CacheFingerprintStore::new(
            config.capacity_bits,
            config.max_entries,
        )),
        StoreKind::Disk => Box::new(DiskFingerprintStore::open_or_create(
            &config.path,
            config.capacity_bits,
        )?),
    };
    info!(
        kind = ?config.store,
        entries = store.size(),
        "Fingerprint store ready"
    );
    Ok(store)
}

/// Writes fingerprints as consecutive little-endian u64 values
pub fn write_dump(path: &Path, values: &[u64]) -> StoreResult<()> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Reads a dump written by `write_dump`
pub fn read_dump(path: &Path) -> StoreResult<Vec<u64>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 8 != 0 {
        return Err(StoreError::Corrupt(format!(
            "{} has {} bytes, not a whole number of fingerprints",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            u64::from_le_bytes(buf)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dump_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump");
        write_dump(&path, &[0, 1, u64::MAX]).unwrap();
        assert_eq!(read_dump(&path).unwrap(), vec![0, 1, u64::MAX]);
    }

    #[test]
    fn test_read_dump_rejects_partial_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        assert!(matches!(read_dump(&path), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_open_store_each_kind() {
        let dir = TempDir::new().unwrap();
        for kind in [StoreKind::Memory, StoreKind::Cache, StoreKind::Disk] {
            let config = FingerprintConfig {
                store: kind,
                capacity_bits: 4,
                max_entries: 8,
                path: dir.path().join(format!("{kind:?}.fps")),
            };
            let mut store = open_store(&config).unwrap();
            assert!(store.add(3).unwrap());
            assert!(store.contains(3).unwrap());
        }
    }

    #[test]
    fn test_open_store_reopens_disk_file() {
        let dir = TempDir::new().unwrap();
        let config = FingerprintConfig {
            store: StoreKind::Disk,
            capacity_bits: 4,
            max_entries: 8,
            path: dir.path().join("seen.fps"),
        };
        {
            let mut store = open_store(&config).unwrap();
            store.add(77).unwrap();
            store.flush().unwrap();
        }
        let mut store = open_store(&config).unwrap();
        assert!(store.contains(77).unwrap());
    }
}

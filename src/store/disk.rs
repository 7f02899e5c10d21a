//! Disk-backed fingerprint store
//!
//! The table lives in a single random-access file: a 32-byte header followed by
//! `2^capacity_bits` little-endian 8-byte slots. Growing writes the rehashed table to
//! a sibling temporary file and renames it over the original, so a crash mid-grow
//! leaves the previous table intact.
//!
//! The file handle is owned by exactly one store; nothing here locks the file
//! against other processes.

use crate::store::table::{OpenAddressTable, SlotStorage, MAX_CAPACITY_BITS};
use crate::store::{FingerprintStore, StoreDescriptor, StoreError, StoreResult};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MAGIC: &[u8; 8] = b"SUMIFPS1";
const HEADER_LEN: u64 = 32;

/// Dump file written into a checkpoint directory by disk stores
pub const DISK_DUMP: &str = "fingerprints.fps";

/// Slots stored in a file
#[derive(Debug)]
pub struct FileSlots {
    path: PathBuf,
    file: File,
    capacity_bits: u32,
}

impl FileSlots {
    /// Creates (or truncates) a slot file of the given size
    fn create(path: &Path, capacity_bits: u32) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(HEADER_LEN + (8u64 << capacity_bits))?;
        let mut slots = Self {
            path: path.to_path_buf(),
            file,
            capacity_bits,
        };
        slots.write_header(0, false)?;
        Ok(slots)
    }

    /// Opens an existing slot file, returning it with the stored count and zero flag
    fn open(path: &Path) -> StoreResult<(Self, u64, bool)> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if &header[0..8] != MAGIC {
            return Err(StoreError::Corrupt(format!(
                "{} is not a fingerprint file",
                path.display()
            )));
        }

        let capacity_bits = u32::from_le_bytes(le_array(&header[8..12]));
        if capacity_bits == 0 || capacity_bits > MAX_CAPACITY_BITS {
            return Err(StoreError::Corrupt(format!(
                "{} declares {} capacity bits",
                path.display(),
                capacity_bits
            )));
        }

        let count = u64::from_le_bytes(le_array(&header[16..24]));
        let contains_zero = u64::from_le_bytes(le_array(&header[24..32])) != 0;

        let expected_len = HEADER_LEN + (8u64 << capacity_bits);
        let actual_len = file.metadata()?.len();
        if actual_len != expected_len {
            return Err(StoreError::Corrupt(format!(
                "{} is {} bytes, expected {}",
                path.display(),
                actual_len,
                expected_len
            )));
        }
        if count > (1u64 << capacity_bits) {
            return Err(StoreError::Corrupt(format!(
                "{} claims {} entries in {} slots",
                path.display(),
                count,
                1u64 << capacity_bits
            )));
        }

        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                capacity_bits,
            },
            count,
            contains_zero,
        ))
    }

    fn write_header(&mut self, count: u64, contains_zero: bool) -> StoreResult<()> {
        let mut header = [0u8; HEADER_LEN as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&self.capacity_bits.to_le_bytes());
        header[16..24].copy_from_slice(&count.to_le_bytes());
        header[24..32].copy_from_slice(&u64::from(contains_zero).to_le_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        Ok(())
    }

    fn offset(index: u64) -> u64 {
        HEADER_LEN + index * 8
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

impl SlotStorage for FileSlots {
    fn capacity_bits(&self) -> u32 {
        self.capacity_bits
    }

    fn get(&mut self, index: u64) -> StoreResult<u64> {
        let mut buf = [0u8; 8];
        self.file.seek(SeekFrom::Start(Self::offset(index)))?;
        self.file.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn set(&mut self, index: u64, value: u64) -> StoreResult<()> {
        self.file.seek(SeekFrom::Start(Self::offset(index)))?;
        self.file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn allocate(&self, capacity_bits: u32) -> StoreResult<Self> {
        let temp = self.path.with_extension("grow");
        Self::create(&temp, capacity_bits)
    }

    fn replace_with(&mut self, grown: Self) -> StoreResult<()> {
        grown.file.sync_all()?;
        fs::rename(&grown.path, &self.path)?;
        self.file = grown.file;
        self.capacity_bits = grown.capacity_bits;
        Ok(())
    }

    fn persist(&mut self, count: u64, contains_zero: bool) -> StoreResult<()> {
        self.write_header(count, contains_zero)?;
        self.file.sync_data()?;
        Ok(())
    }
}

/// Fingerprint store whose table lives in a file
#[derive(Debug)]
pub struct DiskFingerprintStore {
    table: OpenAddressTable<FileSlots>,
}

impl DiskFingerprintStore {
    /// Creates a fresh store at `path`, replacing any file already there
    pub fn create(path: &Path, capacity_bits: u32) -> StoreResult<Self> {
        let slots = FileSlots::create(path, capacity_bits)?;
        info!(path = %path.display(), capacity_bits, "Created disk fingerprint store");
        Ok(Self {
            table: OpenAddressTable::new(slots),
        })
    }

    /// Reopens a store previously written at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        let (slots, count, contains_zero) = FileSlots::open(path)?;
        info!(
            path = %path.display(),
            capacity_bits = slots.capacity_bits,
            entries = count + u64::from(contains_zero),
            "Opened disk fingerprint store"
        );
        Ok(Self {
            table: OpenAddressTable::with_state(slots, count, contains_zero),
        })
    }

    /// Opens the store at `path` if it exists, otherwise creates it
    pub fn open_or_create(path: &Path, capacity_bits: u32) -> StoreResult<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, capacity_bits)
        }
    }

    pub fn path(&self) -> &Path {
        &self.table.slots().path
    }

    pub fn capacity_bits(&self) -> u32 {
        self.table.capacity_bits()
    }
}

impl FingerprintStore for DiskFingerprintStore {
    fn contains(&mut self, fp: u64) -> StoreResult<bool> {
        self.table.contains(fp)
    }

    fn add(&mut self, fp: u64) -> StoreResult<bool> {
        self.table.add(fp)
    }

    fn remove(&mut self, fp: u64) -> StoreResult<bool> {
        self.table.remove(fp)
    }

    fn size(&self) -> u64 {
        self.table.size()
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.table.persist()
    }

    fn checkpoint(&mut self, dir: &Path) -> StoreResult<StoreDescriptor> {
        self.table.persist()?;
        let target = dir.join(DISK_DUMP);
        fs::copy(self.path(), &target)?;
        debug!(from = %self.path().display(), to = %target.display(), "Copied fingerprint file");
        Ok(StoreDescriptor::Disk {
            path: self.path().to_path_buf(),
            dump: DISK_DUMP.to_string(),
        })
    }
}

impl Drop for DiskFingerprintStore {
    fn drop(&mut self) {
        if let Err(e) = self.table.persist() {
            warn!(path = %self.path().display(), "Failed to write fingerprint header: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_add_contains() {
        let dir = TempDir::new().unwrap();
        let mut store = DiskFingerprintStore::create(&dir.path().join("fps"), 4).unwrap();
        assert!(store.add(99).unwrap());
        assert!(!store.add(99).unwrap());
        assert!(store.contains(99).unwrap());
        assert!(!store.contains(100).unwrap());
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_grow_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fps");
        let mut store = DiskFingerprintStore::create(&path, 2).unwrap();
        for fp in 1..=20u64 {
            store.add(fp.wrapping_mul(0x9E37_79B9_7F4A_7C15)).unwrap();
        }
        assert!(store.capacity_bits() >= 6);
        assert!(!path.with_extension("grow").exists());
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            HEADER_LEN + (8u64 << store.capacity_bits())
        );
        for fp in 1..=20u64 {
            assert!(store.contains(fp.wrapping_mul(0x9E37_79B9_7F4A_7C15)).unwrap());
        }
    }

    #[test]
    fn test_reopen_preserves_membership() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fps");
        {
            let mut store = DiskFingerprintStore::create(&path, 3).unwrap();
            for fp in [0u64, 5, 6, 7 << 60] {
                store.add(fp).unwrap();
            }
            store.remove(6).unwrap();
            store.flush().unwrap();
        }

        let mut reopened = DiskFingerprintStore::open(&path).unwrap();
        assert_eq!(reopened.size(), 3);
        assert!(reopened.contains(0).unwrap());
        assert!(reopened.contains(5).unwrap());
        assert!(reopened.contains(7 << 60).unwrap());
        assert!(!reopened.contains(6).unwrap());
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk");
        fs::write(&path, vec![1u8; 64]).unwrap();
        assert!(matches!(
            DiskFingerprintStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_open_rejects_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fps");
        drop(DiskFingerprintStore::create(&path, 4).unwrap());
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(HEADER_LEN + 8).unwrap();
        assert!(matches!(
            DiskFingerprintStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_checkpoint_copies_file() {
        let dir = TempDir::new().unwrap();
        let cp = TempDir::new().unwrap();
        let path = dir.path().join("fps");
        let mut store = DiskFingerprintStore::create(&path, 4).unwrap();
        store.add(12345).unwrap();

        let descriptor = store.checkpoint(cp.path()).unwrap();
        assert_eq!(
            descriptor,
            StoreDescriptor::Disk {
                path: path.clone(),
                dump: DISK_DUMP.to_string(),
            }
        );

        let mut copy = DiskFingerprintStore::open(&cp.path().join(DISK_DUMP)).unwrap();
        assert!(copy.contains(12345).unwrap());
    }
}

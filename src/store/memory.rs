//! In-memory fingerprint store

use crate::store::table::{OpenAddressTable, SlotStorage};
use crate::store::{write_dump, FingerprintStore, StoreDescriptor, StoreResult};
use std::path::Path;

/// Dump file written into a checkpoint directory by in-memory stores
pub const MEMORY_DUMP: &str = "fingerprints.bin";

/// Flat vector of slots
#[derive(Debug, Clone)]
pub struct VecSlots {
    capacity_bits: u32,
    slots: Vec<u64>,
}

impl VecSlots {
    pub fn new(capacity_bits: u32) -> Self {
        Self {
            capacity_bits,
            slots: vec![0; 1usize << capacity_bits],
        }
    }
}

impl SlotStorage for VecSlots {
    fn capacity_bits(&self) -> u32 {
        self.capacity_bits
    }

    fn get(&mut self, index: u64) -> StoreResult<u64> {
        Ok(self.slots[index as usize])
    }

    fn set(&mut self, index: u64, value: u64) -> StoreResult<()> {
        self.slots[index as usize] = value;
        Ok(())
    }

    fn allocate(&self, capacity_bits: u32) -> StoreResult<Self> {
        Ok(Self::new(capacity_bits))
    }

    fn replace_with(&mut self, grown: Self) -> StoreResult<()> {
        *self = grown;
        Ok(())
    }
}

/// Fingerprint store held entirely in memory
#[derive(Debug)]
pub struct MemoryFingerprintStore {
    table: OpenAddressTable<VecSlots>,
}

impl MemoryFingerprintStore {
    /// Creates an empty store with `2^capacity_bits` initial slots
    pub fn new(capacity_bits: u32) -> Self {
        Self {
            table: OpenAddressTable::new(VecSlots::new(capacity_bits)),
        }
    }

    /// Rebuilds a store from previously dumped fingerprints
    pub fn from_values(capacity_bits: u32, values: &[u64]) -> StoreResult<Self> {
        let mut store = Self::new(capacity_bits);
        for fp in values {
            store.table.add(*fp)?;
        }
        Ok(store)
    }

    pub fn capacity_bits(&self) -> u32 {
        self.table.capacity_bits()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
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

    fn checkpoint(&mut self, dir: &Path) -> StoreResult<StoreDescriptor> {
        let values = self.table.values()?;
        write_dump(&dir.join(MEMORY_DUMP), &values)?;
        Ok(StoreDescriptor::Memory {
            capacity_bits: self.table.capacity_bits(),
            dump: MEMORY_DUMP.to_string(),
        })
    }
}

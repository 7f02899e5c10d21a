//! Bounded-capacity fingerprint cache
//!
//! Wraps the in-memory table with a small heat counter per slot and a sweeping
//! clock hand. Below `max_entries` an insert behaves like the plain memory store and
//! may grow the table; at `max_entries` the hand evicts the coldest entry first and
//! the insert never grows. The two triggers are exclusive per insert.

use crate::store::memory::MEMORY_DUMP;
use crate::store::table::{OpenAddressTable, SlotStorage, EMPTY};
use crate::store::{write_dump, FingerprintStore, StoreDescriptor, StoreResult};
use std::path::Path;
use tracing::trace;

const MAX_HEAT: u8 = 3;

/// Slots plus a parallel heat counter for clock eviction
#[derive(Debug, Clone)]
pub struct ClockSlots {
    capacity_bits: u32,
    slots: Vec<u64>,
    heat: Vec<u8>,
}

impl ClockSlots {
    pub fn new(capacity_bits: u32) -> Self {
        let len = 1usize << capacity_bits;
        Self {
            capacity_bits,
            slots: vec![EMPTY; len],
            heat: vec![0; len],
        }
    }

    fn warm(&mut self, index: u64) {
        let heat = &mut self.heat[index as usize];
        *heat = (*heat + 1).min(MAX_HEAT);
    }

    /// Spends one unit of heat; returns false once the slot is cold
    fn cool(&mut self, index: u64) -> bool {
        let heat = &mut self.heat[index as usize];
        if *heat == 0 {
            return false;
        }
        *heat -= 1;
        true
    }
}

impl SlotStorage for ClockSlots {
    fn capacity_bits(&self) -> u32 {
        self.capacity_bits
    }

    fn get(&mut self, index: u64) -> StoreResult<u64> {
        Ok(self.slots[index as usize])
    }

    fn set(&mut self, index: u64, value: u64) -> StoreResult<()> {
        self.slots[index as usize] = value;
        if value == EMPTY {
            self.heat[index as usize] = 0;
        }
        Ok(())
    }

    fn allocate(&self, capacity_bits: u32) -> StoreResult<Self> {
        Ok(Self::new(capacity_bits))
    }

    fn replace_with(&mut self, grown: Self) -> StoreResult<()> {
        *self = grown;
        Ok(())
    }

    fn relocated(&mut self, from: u64, to: u64) {
        self.heat[to as usize] = self.heat[from as usize];
        self.heat[from as usize] = 0;
    }
}

/// In-memory fingerprint set that evicts instead of growing past a ceiling
#[derive(Debug)]
pub struct CacheFingerprintStore {
    table: OpenAddressTable<ClockSlots>,
    max_entries: u64,
    hand: u64,
    evictions: u64,
}

impl CacheFingerprintStore {
    pub fn new(capacity_bits: u32, max_entries: u64) -> Self {
        Self {
            table: OpenAddressTable::new(ClockSlots::new(capacity_bits)),
            max_entries: max_entries.max(1),
            hand: 0,
            evictions: 0,
        }
    }

    /// Rebuilds a cache from previously dumped fingerprints
    pub fn from_values(capacity_bits: u32, max_entries: u64, values: &[u64]) -> StoreResult<Self> {
        let mut cache = Self::new(capacity_bits, max_entries);
        for fp in values {
            cache.add(*fp)?;
        }
        Ok(cache)
    }

    pub fn max_entries(&self) -> u64 {
        self.max_entries
    }

    /// Entries evicted since creation
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Sweeps the clock hand until it finds a cold entry and removes it
    fn evict_one(&mut self) -> StoreResult<()> {
        if self.table.count() == 0 {
            if self.table.contains_zero() {
                self.table.remove(EMPTY)?;
                self.evictions += 1;
            }
            return Ok(());
        }

        let mask = self.table.capacity() - 1;
        loop {
            let index = self.hand & mask;
            self.hand = self.hand.wrapping_add(1);

            let value = self.table.slots_mut().get(index)?;
            if value == EMPTY || self.table.slots_mut().cool(index) {
                continue;
            }

            self.table.remove(value)?;
            self.evictions += 1;
            trace!(fp = value, slot = index, "Evicted fingerprint");
            return Ok(());
        }
    }
}

impl FingerprintStore for CacheFingerprintStore {
    fn contains(&mut self, fp: u64) -> StoreResult<bool> {
        if fp == EMPTY {
            return Ok(self.table.contains_zero());
        }
        match self.table.find(fp)? {
            Some(index) => {
                self.table.slots_mut().warm(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn add(&mut self, fp: u64) -> StoreResult<bool> {
        if self.contains(fp)? {
            return Ok(false);
        }

        if self.table.size() < self.max_entries {
            self.table.add(fp)?;
            if let Some(index) = self.table.find(fp)? {
                self.table.slots_mut().warm(index);
            }
        } else {
            self.evict_one()?;
            if let Some(index) = self.table.insert_absent(fp)? {
                self.table.slots_mut().warm(index);
            }
        }
        Ok(true)
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
        Ok(StoreDescriptor::Cache {
            capacity_bits: self.table.capacity_bits(),
            max_entries: self.max_entries,
            dump: MEMORY_DUMP.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_behaves_like_set_below_ceiling() {
        let mut cache = CacheFingerprintStore::new(2, 100);
        for fp in 1..=50u64 {
            assert!(cache.add(fp << 32).unwrap());
        }
        assert_eq!(cache.size(), 50);
        assert_eq!(cache.evictions(), 0);
        for fp in 1..=50u64 {
            assert!(cache.contains(fp << 32).unwrap());
        }
    }

    #[test]
    fn test_size_never_exceeds_ceiling() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut cache = CacheFingerprintStore::new(3, 16);
        for _ in 0..1_000 {
            cache.add(rng.gen()).unwrap();
            assert!(cache.size() <= 16);
        }
        assert_eq!(cache.size(), 16);
        assert!(cache.evictions() >= 1_000 - 16);
    }

    #[test]
    fn test_no_growth_at_ceiling() {
        let mut cache = CacheFingerprintStore::new(2, 4);
        for fp in 1..=4u64 {
            cache.add(fp << 60).unwrap();
        }
        let bits = cache.table.capacity_bits();
        for fp in 5..=40u64 {
            cache.add(fp << 56).unwrap();
        }
        assert_eq!(cache.table.capacity_bits(), bits);
        assert!(cache.table.size() <= cache.table.load_limit());
    }

    #[test]
    fn test_hot_entry_survives_eviction() {
        let mut cache = CacheFingerprintStore::new(4, 4);
        let hot = 1u64 << 62;
        cache.add(hot).unwrap();
        for fp in 2..=4u64 {
            cache.add(fp << 58).unwrap();
        }
        for _ in 0..3 {
            assert!(cache.contains(hot).unwrap());
        }
        // Every other entry has heat 1, the hot one has 3
        cache.add(9 << 50).unwrap();
        cache.add(10 << 50).unwrap();
        assert!(cache.contains(hot).unwrap());
    }

    #[test]
    fn test_readd_after_eviction_is_novel() {
        let mut cache = CacheFingerprintStore::new(2, 1);
        assert!(cache.add(1 << 40).unwrap());
        assert!(cache.add(2 << 40).unwrap());
        assert!(!cache.contains(1 << 40).unwrap());
        assert!(cache.add(1 << 40).unwrap());
    }
}

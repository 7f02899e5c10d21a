//! Open-addressing table of 64-bit fingerprints
//!
//! The probing algorithm is shared by every store strategy; only the slot storage
//! differs. Slot value 0 marks an empty slot, so the fingerprint 0 itself is tracked
//! by a separate flag.
//!
//! Probing starts at the top `capacity_bits` bits of the fingerprint and walks forward
//! with wraparound. The table doubles before any insert that would push it past half
//! full.

use crate::store::{StoreError, StoreResult};
use tracing::debug;

/// Reserved slot value meaning "nothing stored here"
pub const EMPTY: u64 = 0;

/// Largest table the stores will grow to
pub const MAX_CAPACITY_BITS: u32 = 40;

/// Backing storage for a table of `2^capacity_bits` 64-bit slots
pub trait SlotStorage: Sized {
    fn capacity_bits(&self) -> u32;

    fn get(&mut self, index: u64) -> StoreResult<u64>;

    fn set(&mut self, index: u64, value: u64) -> StoreResult<()>;

    /// Allocates empty storage of the given size to rehash into
    fn allocate(&self, capacity_bits: u32) -> StoreResult<Self>;

    /// Swaps in fully rehashed storage produced by `allocate`
    fn replace_with(&mut self, grown: Self) -> StoreResult<()>;

    /// Called after the entry at `from` was shifted back into `to` during a removal
    fn relocated(&mut self, _from: u64, _to: u64) {}

    /// Records the table's bookkeeping alongside the slots, where the storage has a header
    fn persist(&mut self, _count: u64, _contains_zero: bool) -> StoreResult<()> {
        Ok(())
    }
}

/// Returns the slot a fingerprint probes from first
pub fn ideal_slot(fp: u64, capacity_bits: u32) -> u64 {
    fp >> (64 - capacity_bits)
}

/// Open-addressing fingerprint table over some slot storage
#[derive(Debug)]
pub struct OpenAddressTable<S> {
    slots: S,
    /// Occupied (non-empty) slots
    count: u64,
    contains_zero: bool,
}

impl<S: SlotStorage> OpenAddressTable<S> {
    /// Creates a table over empty slot storage
    pub fn new(slots: S) -> Self {
        Self::with_state(slots, 0, false)
    }

    /// Creates a table over storage that already holds `count` entries
    pub fn with_state(slots: S, count: u64, contains_zero: bool) -> Self {
        Self {
            slots,
            count,
            contains_zero,
        }
    }

    /// Number of fingerprints held, counting 0 if present
    pub fn size(&self) -> u64 {
        self.count + u64::from(self.contains_zero)
    }

    pub fn capacity_bits(&self) -> u32 {
        self.slots.capacity_bits()
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.slots.capacity_bits()
    }

    /// Entries the table holds before its next insert doubles it
    pub fn load_limit(&self) -> u64 {
        self.capacity() / 2
    }

    pub fn contains_zero(&self) -> bool {
        self.contains_zero
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut S {
        &mut self.slots
    }

    /// Walks the probe chain for `fp`
    ///
    /// Returns `Ok(index)` of the slot holding it, or `Err(index)` of the empty slot
    /// that ended the chain.
    fn probe(&mut self, fp: u64) -> StoreResult<Result<u64, u64>> {
        let capacity = self.capacity();
        let mask = capacity - 1;
        let mut index = ideal_slot(fp, self.capacity_bits());

        for _ in 0..capacity {
            let value = self.slots.get(index)?;
            if value == EMPTY {
                return Ok(Err(index));
            }
            if value == fp {
                return Ok(Ok(index));
            }
            index = (index + 1) & mask;
        }

        Err(StoreError::Corrupt(format!(
            "probe for {fp:#018x} wrapped a full table of {capacity} slots"
        )))
    }

    /// Returns the slot index holding `fp`, or None if absent or zero
    pub fn find(&mut self, fp: u64) -> StoreResult<Option<u64>> {
        if fp == EMPTY {
            return Ok(None);
        }
        Ok(self.probe(fp)?.ok())
    }

    pub fn contains(&mut self, fp: u64) -> StoreResult<bool> {
        if fp == EMPTY {
            return Ok(self.contains_zero);
        }
        Ok(self.probe(fp)?.is_ok())
    }

    /// Inserts `fp`, doubling the table first if it would exceed half full
    ///
    /// Returns true iff the fingerprint was newly inserted.
    pub fn add(&mut self, fp: u64) -> StoreResult<bool> {
        if self.contains(fp)? {
            return Ok(false);
        }
        if self.size() + 1 > self.load_limit() {
            self.grow()?;
        }
        self.insert_absent(fp)?;
        Ok(true)
    }

    /// Inserts a fingerprint known to be absent without considering growth
    ///
    /// Returns the slot index used, or None for the zero fingerprint.
    pub fn insert_absent(&mut self, fp: u64) -> StoreResult<Option<u64>> {
        if fp == EMPTY {
            self.contains_zero = true;
            return Ok(None);
        }
        match self.probe(fp)? {
            Ok(index) => Ok(Some(index)),
            Err(index) => {
                self.slots.set(index, fp)?;
                self.count += 1;
                Ok(Some(index))
            }
        }
    }

    /// Removes `fp` and repairs the probe chains that ran through its slot
    ///
    /// After the slot is cleared, every entry up to the next empty slot is checked.
    /// An entry at `j` whose ideal slot `r` lies cyclically in `(hole, j]` is still
    /// reachable; any other entry is shifted back into the hole, which then moves to
    /// `j`.
    pub fn remove(&mut self, fp: u64) -> StoreResult<bool> {
        if fp == EMPTY {
            let had = self.contains_zero;
            self.contains_zero = false;
            return Ok(had);
        }

        let mut hole = match self.probe(fp)? {
            Ok(index) => index,
            Err(_) => return Ok(false),
        };
        self.slots.set(hole, EMPTY)?;
        self.count -= 1;

        let bits = self.capacity_bits();
        let mask = self.capacity() - 1;
        let mut j = hole;
        loop {
            j = (j + 1) & mask;
            let value = self.slots.get(j)?;
            if value == EMPTY {
                break;
            }
            let ideal = ideal_slot(value, bits);
            let reachable = if hole <= j {
                hole < ideal && ideal <= j
            } else {
                hole < ideal || ideal <= j
            };
            if !reachable {
                self.slots.set(hole, value)?;
                self.slots.relocated(j, hole);
                self.slots.set(j, EMPTY)?;
                hole = j;
            }
        }

        Ok(true)
    }

    /// Doubles the table and rehashes every entry into it
    pub fn grow(&mut self) -> StoreResult<()> {
        let old_bits = self.capacity_bits();
        let bits = old_bits + 1;
        if bits > MAX_CAPACITY_BITS {
            return Err(StoreError::CapacityExhausted(old_bits));
        }

        let mut grown = self.slots.allocate(bits)?;
        let mask = (1u64 << bits) - 1;
        for index in 0..self.capacity() {
            let value = self.slots.get(index)?;
            if value == EMPTY {
                continue;
            }
            let mut target = ideal_slot(value, bits);
            while grown.get(target)? != EMPTY {
                target = (target + 1) & mask;
            }
            grown.set(target, value)?;
        }

        self.slots.replace_with(grown)?;
        self.slots.persist(self.count, self.contains_zero)?;
        debug!(
            from_bits = old_bits,
            to_bits = bits,
            entries = self.size(),
            "Grew fingerprint table"
        );
        Ok(())
    }

    /// Returns every stored fingerprint, including 0 if present
    pub fn values(&mut self) -> StoreResult<Vec<u64>> {
        let mut values = Vec::with_capacity(self.size() as usize);
        if self.contains_zero {
            values.push(EMPTY);
        }
        for index in 0..self.capacity() {
            let value = self.slots.get(index)?;
            if value != EMPTY {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Writes the bookkeeping through to the slot storage
    pub fn persist(&mut self) -> StoreResult<()> {
        self.slots.persist(self.count, self.contains_zero)
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::VecSlots;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn table(bits: u32) -> OpenAddressTable<VecSlots> {
        OpenAddressTable::new(VecSlots::new(bits))
    }

    /// Fingerprint whose ideal slot is `slot` in a table of `bits` bits
    fn fp_at(slot: u64, bits: u32, low: u64) -> u64 {
        (slot << (64 - bits)) | low
    }

    #[test]
    fn test_ideal_slot_uses_top_bits() {
        assert_eq!(ideal_slot(0xF000_0000_0000_0000, 4), 0xF);
        assert_eq!(ideal_slot(0x0FFF_FFFF_FFFF_FFFF, 4), 0);
        assert_eq!(ideal_slot(u64::MAX, 1), 1);
    }

    #[test]
    fn test_add_contains_remove() {
        let mut t = table(4);
        assert!(t.add(42).unwrap());
        assert!(!t.add(42).unwrap());
        assert!(t.contains(42).unwrap());
        assert!(!t.contains(43).unwrap());
        assert_eq!(t.size(), 1);

        assert!(t.remove(42).unwrap());
        assert!(!t.remove(42).unwrap());
        assert!(!t.contains(42).unwrap());
        assert_eq!(t.size(), 0);
    }

    #[test]
    fn test_zero_is_storable() {
        let mut t = table(4);
        assert!(!t.contains(0).unwrap());
        assert!(t.add(0).unwrap());
        assert!(t.contains(0).unwrap());
        assert!(!t.add(0).unwrap());
        assert_eq!(t.size(), 1);
        assert!(t.remove(0).unwrap());
        assert!(!t.contains(0).unwrap());
    }

    #[test]
    fn test_grow_keeps_load_at_half() {
        let mut t = table(2);
        for fp in 1..=10u64 {
            t.add(fp.wrapping_mul(0x9E37_79B9_7F4A_7C15)).unwrap();
            assert!(t.size() <= t.load_limit());
        }
        assert_eq!(t.capacity_bits(), 5);
    }

    #[test]
    fn test_wraparound_probe() {
        let bits = 3;
        let mut t = table(bits);
        let a = fp_at(7, bits, 1);
        let b = fp_at(7, bits, 2);
        let c = fp_at(7, bits, 3);
        t.add(a).unwrap();
        t.add(b).unwrap();
        t.add(c).unwrap();
        // b and c wrapped to slots 0 and 1
        assert_eq!(t.find(b).unwrap(), Some(0));
        assert_eq!(t.find(c).unwrap(), Some(1));
    }

    #[test]
    fn test_remove_repairs_wrapped_chain() {
        let bits = 3;
        let mut t = table(bits);
        let a = fp_at(6, bits, 1);
        let b = fp_at(6, bits, 2);
        let c = fp_at(7, bits, 3);
        let d = fp_at(0, bits, 4);
        for fp in [a, b, c, d] {
            t.add(fp).unwrap();
        }
        // a@6 b@7 c@0 d@1
        assert!(t.remove(a).unwrap());
        for fp in [b, c, d] {
            assert!(t.contains(fp).unwrap(), "{fp:#x} lost after remove");
        }
        assert_eq!(t.find(b).unwrap(), Some(6));
        assert_eq!(t.find(c).unwrap(), Some(7));
        assert_eq!(t.find(d).unwrap(), Some(0));
    }

    #[test]
    fn test_remove_leaves_reachable_entries_in_place() {
        let bits = 3;
        let mut t = table(bits);
        let a = fp_at(2, bits, 1);
        let b = fp_at(3, bits, 2);
        t.add(a).unwrap();
        t.add(b).unwrap();
        t.remove(a).unwrap();
        assert_eq!(t.find(b).unwrap(), Some(3));
    }

    #[test]
    fn test_randomized_against_model() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for round in 0..20 {
            let mut t = table(2);
            let mut model = HashSet::new();
            // Narrow high bits force long clustered chains
            let spread: u64 = if round % 2 == 0 { 0xFF } else { u64::MAX };
            for _ in 0..2_000 {
                let fp = if spread == u64::MAX {
                    rng.gen::<u64>()
                } else {
                    (rng.gen::<u64>() & spread) << 56 | rng.gen_range(0..4)
                };
                if rng.gen_bool(0.35) {
                    assert_eq!(t.remove(fp).unwrap(), model.remove(&fp));
                } else {
                    assert_eq!(t.add(fp).unwrap(), model.insert(fp));
                }
                assert!(t.size() <= t.load_limit());
            }
            assert_eq!(t.size(), model.len() as u64);
            for fp in &model {
                assert!(t.contains(*fp).unwrap());
            }
            for _ in 0..500 {
                let probe = rng.gen::<u64>();
                assert_eq!(t.contains(probe).unwrap(), model.contains(&probe));
            }
        }
    }

    #[test]
    fn test_membership_survives_forced_grow() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut t = table(4);
        let inserted: Vec<u64> = (0..8).map(|_| rng.gen::<u64>() | 1).collect();
        for fp in &inserted {
            t.add(*fp).unwrap();
        }
        t.grow().unwrap();
        t.grow().unwrap();
        for fp in &inserted {
            assert!(t.contains(*fp).unwrap());
        }
        let mut values = t.values().unwrap();
        values.sort_unstable();
        let mut expected = inserted.clone();
        expected.sort_unstable();
        assert_eq!(values, expected);
    }

    /// Reports a full-size table without allocating one
    struct HugeSlots;

    impl SlotStorage for HugeSlots {
        fn capacity_bits(&self) -> u32 {
            MAX_CAPACITY_BITS
        }

        fn get(&mut self, _index: u64) -> StoreResult<u64> {
            Ok(EMPTY)
        }

        fn set(&mut self, _index: u64, _value: u64) -> StoreResult<()> {
            Ok(())
        }

        fn allocate(&self, _capacity_bits: u32) -> StoreResult<Self> {
            panic!("allocate must not be reached past the size limit")
        }

        fn replace_with(&mut self, _grown: Self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_grow_beyond_limit_fails() {
        let mut t = OpenAddressTable::new(HugeSlots);
        assert!(matches!(
            t.grow(),
            Err(StoreError::CapacityExhausted(MAX_CAPACITY_BITS))
        ));
    }
}

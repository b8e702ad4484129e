//! SlotTable: fixed-capacity array of three-state slots.
//!
//! Slot lifecycle: `Unused -> Active -> Tombstone -> Active ...`. A
//! tombstone never becomes `Unused` again except through a full rebuild,
//! because `Unused` is the signal that stops a probe: demoting a
//! tombstone would hide entries further along its probe paths.
//!
//! Tables of `MIN_SIZE` slots live inline in the container; larger ones
//! spill into a heap buffer.

use crate::error::PairsError;
use crate::hashing::HashValue;
use crate::probe::ProbeSequence;
use smallvec::SmallVec;
use std::rc::Rc;

/// Minimum table size; must be a power of two.
pub const MIN_SIZE: usize = 8;

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) hash: HashValue,
    pub(crate) key: Rc<K>,
    pub(crate) value: Rc<V>,
}

#[derive(Debug)]
pub(crate) enum Slot<K, V> {
    Unused,
    Tombstone,
    Active(Entry<K, V>),
}

/// What `SlotTable::place` did with the target slot.
pub(crate) enum Placement<K, V> {
    /// An `Unused` slot became `Active`; `fill` grew.
    Inserted,
    /// A tombstone was reused; `fill` is unchanged.
    Reclaimed,
    /// The key was already present: its value was swapped. The slot keeps
    /// its original key, so the caller's key handle is handed back too.
    Replaced { old_value: Rc<V>, spare_key: Rc<K> },
}

pub(crate) struct SlotTable<K, V> {
    slots: SmallVec<[Slot<K, V>; MIN_SIZE]>,
    fill: usize,
    used: usize,
}

impl<K, V> SlotTable<K, V> {
    /// Minimum-size table; never allocates.
    pub(crate) fn new() -> Self {
        let mut slots = SmallVec::new();
        slots.extend((0..MIN_SIZE).map(|_| Slot::Unused));
        Self {
            slots,
            fill: 0,
            used: 0,
        }
    }

    /// Empty table of `size` slots. `size` must be a power of two no
    /// smaller than `MIN_SIZE`. Allocation failure is reported, not
    /// aborted on.
    pub(crate) fn with_capacity(size: usize) -> Result<Self, PairsError> {
        debug_assert!(size.is_power_of_two() && size >= MIN_SIZE);
        let mut slots: SmallVec<[Slot<K, V>; MIN_SIZE]> = SmallVec::new();
        slots
            .try_reserve_exact(size)
            .map_err(|_| PairsError::AllocationFailure { slots: size })?;
        slots.extend((0..size).map(|_| Slot::Unused));
        Ok(Self {
            slots,
            fill: 0,
            used: 0,
        })
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of non-`Unused` slots.
    #[inline]
    pub(crate) fn fill(&self) -> usize {
        self.fill
    }

    /// Number of `Active` slots.
    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub(crate) fn is_inline(&self) -> bool {
        !self.slots.spilled()
    }

    #[inline]
    pub(crate) fn slot(&self, index: usize) -> &Slot<K, V> {
        &self.slots[index]
    }

    /// Store an association at `index`, which must come from a lookup for
    /// `key` performed against this very table.
    pub(crate) fn place(
        &mut self,
        index: usize,
        hash: HashValue,
        key: Rc<K>,
        value: Rc<V>,
    ) -> Placement<K, V> {
        let slot = &mut self.slots[index];
        if let Slot::Active(entry) = &mut *slot {
            let old_value = core::mem::replace(&mut entry.value, value);
            return Placement::Replaced {
                old_value,
                spare_key: key,
            };
        }
        let reclaimed = matches!(slot, Slot::Tombstone);
        *slot = Slot::Active(Entry { hash, key, value });
        self.used += 1;
        if reclaimed {
            Placement::Reclaimed
        } else {
            self.fill += 1;
            Placement::Inserted
        }
    }

    /// Turn an `Active` slot into a tombstone, handing back its handles.
    pub(crate) fn vacate(&mut self, index: usize) -> Option<(Rc<K>, Rc<V>)> {
        let slot = &mut self.slots[index];
        if !matches!(slot, Slot::Active(_)) {
            return None;
        }
        match core::mem::replace(slot, Slot::Tombstone) {
            Slot::Active(entry) => {
                self.used -= 1;
                Some((entry.key, entry.value))
            }
            _ => None,
        }
    }

    /// Insert an entry known to be absent into a table known to hold no
    /// tombstones. No lookup, no comparisons: only the rebuild path may
    /// call this.
    pub(crate) fn insert_clean(&mut self, entry: Entry<K, V>) {
        debug_assert_eq!(self.fill, self.used, "insert_clean on a table with tombstones");
        debug_assert!(self.fill < self.capacity(), "insert_clean on a full table");
        let mut probe = ProbeSequence::new(entry.hash, self.mask());
        let mut index = probe.next_index();
        while !matches!(self.slots[index], Slot::Unused) {
            index = probe.next_index();
        }
        self.slots[index] = Slot::Active(entry);
        self.fill += 1;
        self.used += 1;
    }

    /// Iterate over live entries in slot order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &Entry<K, V>> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Active(e) => Some(e),
            _ => None,
        })
    }

    /// Consume the table, yielding its live entries. Tombstones vanish.
    pub(crate) fn into_entries(self) -> impl Iterator<Item = Entry<K, V>> {
        self.slots.into_iter().filter_map(|s| match s {
            Slot::Active(e) => Some(e),
            _ => None,
        })
    }

    /// Swap in an empty minimum-size table and return the old one.
    pub(crate) fn take(&mut self) -> Self {
        core::mem::replace(self, Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: HashValue, k: i64, v: i64) -> Entry<i64, i64> {
        Entry {
            hash,
            key: Rc::new(k),
            value: Rc::new(v),
        }
    }

    #[test]
    fn new_table_is_inline_and_empty() {
        let t: SlotTable<i64, i64> = SlotTable::new();
        assert_eq!(t.capacity(), MIN_SIZE);
        assert_eq!(t.mask(), MIN_SIZE - 1);
        assert!(t.is_inline());
        assert_eq!((t.fill(), t.used()), (0, 0));
    }

    #[test]
    fn larger_tables_spill_to_the_heap() {
        let t: SlotTable<i64, i64> = SlotTable::with_capacity(64).unwrap();
        assert_eq!(t.capacity(), 64);
        assert!(!t.is_inline());
    }

    #[test]
    fn slot_transitions_track_fill_and_used() {
        let mut t: SlotTable<i64, i64> = SlotTable::new();
        assert!(matches!(
            t.place(3, 3, Rc::new(1), Rc::new(10)),
            Placement::Inserted
        ));
        assert_eq!((t.fill(), t.used()), (1, 1));

        let (k, v) = t.vacate(3).unwrap();
        assert_eq!((*k, *v), (1, 10));
        assert!(matches!(t.slot(3), Slot::Tombstone));
        assert_eq!((t.fill(), t.used()), (1, 0));

        // Vacating a tombstone is a no-op.
        assert!(t.vacate(3).is_none());

        assert!(matches!(
            t.place(3, 3, Rc::new(1), Rc::new(11)),
            Placement::Reclaimed
        ));
        assert_eq!((t.fill(), t.used()), (1, 1));

        match t.place(3, 3, Rc::new(1), Rc::new(12)) {
            Placement::Replaced {
                old_value,
                spare_key,
            } => {
                assert_eq!(*old_value, 11);
                assert_eq!(*spare_key, 1);
            }
            _ => panic!("expected replacement"),
        }
        assert_eq!((t.fill(), t.used()), (1, 1));
    }

    #[test]
    fn insert_clean_follows_the_probe_sequence() {
        let mut t: SlotTable<i64, i64> = SlotTable::new();
        t.insert_clean(entry(10, 1, 1));
        t.insert_clean(entry(18, 2, 2));
        // 10 & 7 == 2; 18 collides at 2 and probes to (5*2 + 18 + 1) & 7 == 5.
        assert!(matches!(t.slot(2), Slot::Active(e) if *e.key == 1));
        assert!(matches!(t.slot(5), Slot::Active(e) if *e.key == 2));
        assert_eq!((t.fill(), t.used()), (2, 2));
    }

    #[test]
    fn into_entries_drops_tombstones() {
        let mut t: SlotTable<i64, i64> = SlotTable::new();
        t.place(0, 0, Rc::new(0), Rc::new(0));
        t.place(1, 1, Rc::new(1), Rc::new(1));
        t.vacate(0);
        let live: Vec<i64> = t.into_entries().map(|e| *e.key).collect();
        assert_eq!(live, vec![1]);
    }

    #[test]
    fn take_leaves_a_fresh_minimum_table() {
        let mut t: SlotTable<i64, i64> = SlotTable::with_capacity(32).unwrap();
        t.insert_clean(entry(4, 4, 4));
        let old = t.take();
        assert_eq!(old.used(), 1);
        assert_eq!(t.capacity(), MIN_SIZE);
        assert_eq!(t.used(), 0);
    }
}

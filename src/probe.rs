//! Probe sequence and lookup.
//!
//! Open addressing after Knuth, Algorithm D. The first index is
//! `hash & mask`; each following one is `i = 5*i + perturb + 1` (masked),
//! with `perturb` starting at the hash and shifted right by
//! `PERTURB_SHIFT` after every step so high-order hash bits eventually
//! take part. Once `perturb` reaches zero the recurrence degenerates to
//! `5*i + 1 mod 2^k`, which visits every slot, so a probe always reaches
//! an `Unused` slot as long as one exists.

use crate::capability::PairKey;
use crate::error::PairsError;
use crate::hashing::HashValue;
use crate::reentrancy::Epoch;
use crate::slot::{Slot, SlotTable};
use core::cell::RefCell;
use core::cmp::Ordering;
use std::rc::Rc;

/// Must be at least 1.
pub const PERTURB_SHIFT: u32 = 5;

/// Infinite sequence of slot indices for one hash.
#[derive(Debug, Clone)]
pub struct ProbeSequence {
    i: usize,
    perturb: usize,
    mask: usize,
    started: bool,
}

impl ProbeSequence {
    pub fn new(hash: HashValue, mask: usize) -> Self {
        let bits = hash as u64 as usize;
        Self {
            i: bits & mask,
            perturb: bits,
            mask,
            started: false,
        }
    }

    #[inline]
    pub fn next_index(&mut self) -> usize {
        if !self.started {
            self.started = true;
            return self.i & self.mask;
        }
        self.i = self
            .i
            .wrapping_mul(5)
            .wrapping_add(self.perturb)
            .wrapping_add(1);
        self.perturb >>= PERTURB_SHIFT;
        self.i & self.mask
    }
}

impl Iterator for ProbeSequence {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        Some(self.next_index())
    }
}

/// Find the slot for `key`: the `Active` slot holding an equal key, or
/// else the slot an insertion should use (the first tombstone on the
/// probe path if any, otherwise the terminating `Unused` slot).
///
/// The table borrow is released around every call to `PairKey::compare`,
/// which may mutate the table. Afterwards the epoch and the compared slot
/// are re-checked; if the table was rebuilt or the slot changed hands, the
/// search starts over. A comparison failure aborts the lookup.
pub(crate) fn lookup<K, V>(
    table: &RefCell<SlotTable<K, V>>,
    epoch: &Epoch,
    key: &K,
    hash: HashValue,
) -> Result<usize, PairsError>
where
    K: PairKey,
{
    'restart: loop {
        let start_epoch = epoch.get();
        let mut probe = ProbeSequence::new(hash, table.borrow().mask());
        let mut free_slot: Option<usize> = None;

        loop {
            let index = probe.next_index();
            let candidate = {
                let t = table.borrow();
                match t.slot(index) {
                    Slot::Unused => match free_slot {
                        None => return Ok(index),
                        // A comparison may have filled the remembered tombstone.
                        Some(free) if matches!(t.slot(free), Slot::Tombstone) => return Ok(free),
                        Some(_) => {
                            tracing::trace!(hash, "remembered tombstone was reused; restarting lookup");
                            continue 'restart;
                        }
                    },
                    Slot::Tombstone => {
                        if free_slot.is_none() {
                            free_slot = Some(index);
                        }
                        continue;
                    }
                    Slot::Active(entry) => {
                        if core::ptr::eq(Rc::as_ptr(&entry.key), key) {
                            return Ok(index);
                        }
                        if entry.hash != hash {
                            continue;
                        }
                        Rc::clone(&entry.key)
                    }
                }
            };

            let ordering = K::compare(&candidate, key)?;

            let intact = epoch.get() == start_epoch
                && matches!(
                    table.borrow().slot(index),
                    Slot::Active(entry) if Rc::ptr_eq(&entry.key, &candidate)
                );
            // Dropping the last handle may run user code; no borrow is held here.
            drop(candidate);
            if !intact {
                tracing::trace!(hash, index, "table mutated during key comparison; restarting lookup");
                continue 'restart;
            }
            if ordering == Some(Ordering::Equal) {
                return Ok(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_index_is_hash_and_mask() {
        let mut p = ProbeSequence::new(10, 7);
        assert_eq!(p.next_index(), 2);
    }

    #[test]
    fn recurrence_mixes_in_perturbation() {
        // i = 2; i = 5*2 + 18 + 1 = 29 -> 29 & 7 = 5; perturb = 18 >> 5 = 0;
        // i = 5*29 + 0 + 1 = 146 -> 146 & 7 = 2.
        let p = ProbeSequence::new(18, 7);
        let seq: Vec<usize> = p.take(3).collect();
        assert_eq!(seq, vec![2, 5, 2]);
    }

    #[test]
    fn negative_hashes_probe_like_their_unsigned_bits() {
        let a: Vec<usize> = ProbeSequence::new(-2, 15).take(8).collect();
        let b: Vec<usize> = ProbeSequence::new((-2i64 as u64) as HashValue, 15).take(8).collect();
        assert_eq!(a, b);
        assert_eq!(a[0], 14);
    }

    #[test]
    fn sequence_eventually_visits_every_slot() {
        for mask in [7usize, 15, 63, 255] {
            for hash in [0i64, 1, 12345, -1, i64::MAX, i64::MIN] {
                let mut seen = vec![false; mask + 1];
                for i in ProbeSequence::new(hash, mask).take((mask + 1) * 16) {
                    seen[i] = true;
                }
                assert!(seen.iter().all(|&s| s), "mask {mask} hash {hash}");
            }
        }
    }
}

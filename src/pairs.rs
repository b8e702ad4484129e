//! Pairs: the user-facing container.
//!
//! A `Pairs` is a mutable one-value-per-key map while it is being built
//! and an immutable, hashable value once `compute_hash` has run. All
//! methods take `&self`: the table lives in a `RefCell` so that key
//! comparisons, hash callbacks, release hooks and `Drop` impls may
//! re-enter the container. No table borrow is ever held while user code
//! runs.

use crate::capability::{Coefficient, PairKey, PairValue};
use crate::error::PairsError;
use crate::freeze::FreezeGuard;
use crate::hashing::{self, HashValue};
use crate::probe;
use crate::reentrancy::{DebugReentrancy, Epoch, Partners};
use crate::release::{DropRelease, Release};
use crate::resize;
use crate::slot::{Placement, Slot, SlotTable};
use core::cell::RefCell;
use core::cmp::Ordering;
use core::fmt;
use std::rc::Rc;

pub struct Pairs<K, V, R = DropRelease>
where
    R: Release<K, V>,
{
    table: RefCell<SlotTable<K, V>>,
    epoch: Epoch,
    freeze: FreezeGuard,
    rebuilding: DebugReentrancy,
    comparing: Partners,
    release: R,
}

impl<K, V> Pairs<K, V> {
    pub fn new() -> Self {
        Self::with_release(DropRelease)
    }
}

impl<K, V> Default for Pairs<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, R> Pairs<K, V, R>
where
    R: Release<K, V>,
{
    pub fn with_release(release: R) -> Self {
        Self {
            table: RefCell::new(SlotTable::new()),
            epoch: Epoch::new(),
            freeze: FreezeGuard::new(),
            rebuilding: DebugReentrancy::new(),
            comparing: Partners::new(),
            release,
        }
    }

    pub fn release_hook(&self) -> &R {
        &self.release
    }

    /// Number of live associations.
    pub fn len(&self) -> usize {
        self.table.borrow().used()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots in the current table (a power of two, at least 8).
    pub fn capacity(&self) -> usize {
        self.table.borrow().capacity()
    }

    /// Number of non-`Unused` slots, tombstones included.
    pub fn fill(&self) -> usize {
        self.table.borrow().fill()
    }

    /// True while the hash has not been computed.
    pub fn is_writable(&self) -> bool {
        !self.freeze.is_frozen()
    }

    pub fn cached_hash(&self) -> Option<HashValue> {
        self.freeze.cached()
    }

    /// Snapshot of the live associations in slot order.
    pub fn items(&self) -> Vec<(Rc<K>, Rc<V>)> {
        self.table
            .borrow()
            .entries()
            .map(|e| (Rc::clone(&e.key), Rc::clone(&e.value)))
            .collect()
    }

    /// Remove every association. Fails once the container is frozen.
    pub fn clear(&self) -> Result<(), PairsError> {
        self.freeze.ensure_writable("clear")?;
        self.release_all();
        Ok(())
    }

    /// Release every owned handle regardless of the freeze state, leaving
    /// an empty minimum-size table. Meant for breaking reference cycles
    /// right before the container goes away; `Drop` calls it too.
    pub fn teardown(&self) {
        self.release_all();
    }

    fn release_all(&self) {
        let old = self.table.borrow_mut().take();
        self.epoch.advance();
        if old.used() > 0 {
            tracing::trace!(released = old.used(), "releasing all associations");
        }
        for entry in old.into_entries() {
            self.release.release_key(entry.key);
            self.release.release_value(entry.value);
        }
    }

    fn rebuild(&self, min_used: usize) -> Result<(), PairsError> {
        let _g = self.rebuilding.enter();
        let rebuilt = resize::resize(&mut self.table.borrow_mut(), min_used)?;
        if rebuilt {
            self.epoch.advance();
        }
        Ok(())
    }

    fn maybe_grow(&self) -> Result<(), PairsError> {
        let request = {
            let t = self.table.borrow();
            if !resize::needs_growth(&t) {
                return Ok(());
            }
            resize::growth_request(&t)
        };
        self.rebuild(request)
    }

    fn maybe_shrink(&self) -> Result<(), PairsError> {
        let request = {
            let t = self.table.borrow();
            if !resize::needs_shrink(&t) {
                return Ok(());
            }
            resize::shrink_request(&t)
        };
        self.rebuild(request)
    }
}

impl<K, V, R> Pairs<K, V, R>
where
    K: PairKey,
    R: Release<K, V>,
{
    fn locate(&self, key: &K, hash: HashValue) -> Result<usize, PairsError> {
        probe::lookup(&self.table, &self.epoch, key, hash)
    }

    pub fn get(&self, key: &K) -> Result<Option<Rc<V>>, PairsError> {
        let hash = key.hash_key()?;
        let index = self.locate(key, hash)?;
        let t = self.table.borrow();
        Ok(match t.slot(index) {
            Slot::Active(entry) => Some(Rc::clone(&entry.value)),
            _ => None,
        })
    }

    pub fn contains_key(&self, key: &K) -> Result<bool, PairsError> {
        Ok(self.get(key)?.is_some())
    }

    /// Associate `value` with `key`, taking ownership of both handles.
    ///
    /// If an equal key is present its value is replaced: the old value
    /// and the now redundant `key` handle go to the release hook, and the
    /// slot keeps its original key. A growth rebuild may follow; if that
    /// fails with `AllocationFailure` the association is still stored.
    pub fn insert(&self, key: impl Into<Rc<K>>, value: impl Into<Rc<V>>) -> Result<(), PairsError> {
        self.freeze.ensure_writable("insert")?;
        let key = key.into();
        let value = value.into();
        let hash = key.hash_key()?;

        let index = loop {
            let index = self.locate(&key, hash)?;
            // A comparison callback may have frozen the container.
            self.freeze.ensure_writable("insert")?;
            let takes_last_unused = {
                let t = self.table.borrow();
                matches!(t.slot(index), Slot::Unused) && t.fill() + 1 >= t.capacity()
            };
            if !takes_last_unused {
                break index;
            }
            // Only reachable after an earlier growth rebuild failed.
            let request = resize::growth_request(&self.table.borrow());
            self.rebuild(request)?;
        };

        let placement = self.table.borrow_mut().place(index, hash, key, value);
        match placement {
            Placement::Replaced {
                old_value,
                spare_key,
            } => {
                self.release.release_value(old_value);
                self.release.release_key(spare_key);
                Ok(())
            }
            Placement::Reclaimed => Ok(()),
            Placement::Inserted => self.maybe_grow(),
        }
    }

    /// Remove the association for `key`. Returns whether one existed.
    ///
    /// A shrink rebuild may follow; if it fails with `AllocationFailure`
    /// the removal has still taken effect.
    pub fn remove(&self, key: &K) -> Result<bool, PairsError> {
        self.freeze.ensure_writable("remove")?;
        let hash = key.hash_key()?;
        let index = self.locate(key, hash)?;
        self.freeze.ensure_writable("remove")?;

        let vacated = self.table.borrow_mut().vacate(index);
        let Some((old_key, old_value)) = vacated else {
            return Ok(false);
        };
        let shrunk = self.maybe_shrink();
        self.release.release_key(old_key);
        self.release.release_value(old_value);
        shrunk.map(|()| true)
    }

    #[cfg(test)]
    pub(crate) fn slot_of(&self, key: &K) -> Option<usize> {
        let hash = key.hash_key().ok()?;
        let index = self.locate(key, hash).ok()?;
        match self.table.borrow().slot(index) {
            Slot::Active(_) => Some(index),
            _ => None,
        }
    }
}

impl<K, V, R> Pairs<K, V, R>
where
    K: PairKey,
    V: PairValue,
    R: Release<K, V>,
{
    /// Structural hash of the container, computed once and cached.
    ///
    /// The first successful call freezes the container. The hash only
    /// depends on the set of associations, not on insertion order or slot
    /// placement.
    pub fn compute_hash(&self) -> Result<HashValue, PairsError> {
        self.freeze.get_or_compute(|| {
            let snapshot: Vec<(HashValue, Rc<V>)> = self
                .table
                .borrow()
                .entries()
                .map(|e| (e.hash, Rc::clone(&e.value)))
                .collect();
            hashing::unordered_hash(
                snapshot
                    .iter()
                    .map(|(kh, v)| v.structural_hash().map(|vh| (*kh, vh))),
            )
        })
    }
}

impl<K, V, R> Pairs<K, V, R>
where
    K: PairKey,
    V: PairKey,
    R: Release<K, V>,
{
    /// Same length and every key maps to an equal value.
    ///
    /// Comparing two structures that contain themselves would recurse
    /// without end; the nested call on the same pair fails with
    /// `ComparisonFailure` instead.
    pub fn equals<R2>(&self, other: &Pairs<K, V, R2>) -> Result<bool, PairsError>
    where
        R2: Release<K, V>,
    {
        let partner = other as *const Pairs<K, V, R2> as *const ();
        if core::ptr::eq(self as *const Self as *const (), partner) {
            return Ok(true);
        }
        if self.len() != other.len() {
            return Ok(false);
        }
        let Some(_active) = self.comparing.enter(partner) else {
            tracing::trace!("equality re-entered on the same pair; structure is cyclic");
            return Err(PairsError::comparison("cyclic structure"));
        };
        for (key, value) in self.items() {
            let Some(theirs) = other.get(&key)? else {
                return Ok(false);
            };
            if value.compare(&theirs)? != Some(Ordering::Equal) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<K, V, R> Pairs<K, V, R>
where
    K: PairKey,
    V: Coefficient,
    R: Release<K, V>,
{
    /// Add `value` to the coefficient stored under `key`. Absent keys are
    /// inserted as-is; a sum of zero removes the association.
    pub fn add_item(&self, key: impl Into<Rc<K>>, value: impl Into<Rc<V>>) -> Result<(), PairsError> {
        self.freeze.ensure_writable("add_item")?;
        let key = key.into();
        let value = value.into();
        match self.get(&key)? {
            None => self.insert(key, value),
            Some(current) => self.store_coefficient(key, Coefficient::add(&*current, &*value)?),
        }
    }

    /// Subtract `value` from the coefficient stored under `key`. Absent
    /// keys are inserted negated; a difference of zero removes the
    /// association.
    pub fn sub_item(&self, key: impl Into<Rc<K>>, value: impl Into<Rc<V>>) -> Result<(), PairsError> {
        self.freeze.ensure_writable("sub_item")?;
        let key = key.into();
        let value = value.into();
        match self.get(&key)? {
            None => self.insert(key, value.neg()?),
            Some(current) => self.store_coefficient(key, Coefficient::sub(&*current, &*value)?),
        }
    }

    /// `add_item` for every association of `other`.
    pub fn add_pairs<R2>(&self, other: &Pairs<K, V, R2>) -> Result<(), PairsError>
    where
        R2: Release<K, V>,
    {
        self.freeze.ensure_writable("add_pairs")?;
        for (key, value) in other.items() {
            self.add_item(key, value)?;
        }
        Ok(())
    }

    /// `sub_item` for every association of `other`.
    pub fn sub_pairs<R2>(&self, other: &Pairs<K, V, R2>) -> Result<(), PairsError>
    where
        R2: Release<K, V>,
    {
        self.freeze.ensure_writable("sub_pairs")?;
        for (key, value) in other.items() {
            self.sub_item(key, value)?;
        }
        Ok(())
    }

    /// `add_item(key, value * coeff)` for every association of `other`.
    pub fn add_pairs_scaled<R2>(&self, other: &Pairs<K, V, R2>, coeff: &V) -> Result<(), PairsError>
    where
        R2: Release<K, V>,
    {
        self.freeze.ensure_writable("add_pairs_scaled")?;
        for (key, value) in other.items() {
            self.add_item(key, value.mul(coeff)?)?;
        }
        Ok(())
    }

    fn store_coefficient(&self, key: Rc<K>, value: V) -> Result<(), PairsError> {
        if value.is_zero() {
            self.remove(&key).map(|_| ())
        } else {
            self.insert(key, value)
        }
    }
}

/// Containers nest: a map stored as a value hashes order-independently.
impl<K, V, R> PairValue for Pairs<K, V, R>
where
    K: PairKey,
    V: PairValue,
    R: Release<K, V>,
{
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        self.compute_hash()
    }
}

/// Containers can be keys. Hashing one freezes it.
impl<K, V, R> PairKey for Pairs<K, V, R>
where
    K: PairKey,
    V: PairKey + PairValue,
    R: Release<K, V>,
{
    fn hash_key(&self) -> Result<HashValue, PairsError> {
        self.compute_hash()
    }

    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
        Ok(self.equals(other)?.then_some(Ordering::Equal))
    }
}

impl<K, V, R> Drop for Pairs<K, V, R>
where
    R: Release<K, V>,
{
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<K, V, R> fmt::Debug for Pairs<K, V, R>
where
    K: fmt::Debug,
    V: fmt::Debug,
    R: Release<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.items();
        f.debug_map()
            .entries(items.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

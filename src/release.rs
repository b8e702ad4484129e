//! Ownership release hooks.
//!
//! A container holds one `Rc` handle per stored key and value. Whenever
//! it gives one up (overwrite, removal, clear, teardown or drop) the
//! handle is passed to the container's `Release` hook exactly once.
//! Handles passed into a call that fails before storing them were never
//! owned by the container; they are simply dropped. The hook always runs
//! with no table borrow outstanding, so it may re-enter the container.

use core::cell::Cell;
use std::rc::Rc;

/// Receiver for handles a container no longer owns.
pub trait Release<K, V> {
    fn release_key(&self, key: Rc<K>);
    fn release_value(&self, value: Rc<V>);
}

/// Default hook: drops the handle, decrementing its strong count.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropRelease;

impl<K, V> Release<K, V> for DropRelease {
    #[inline]
    fn release_key(&self, key: Rc<K>) {
        drop(key);
    }

    #[inline]
    fn release_value(&self, value: Rc<V>) {
        drop(value);
    }
}

/// Hook that counts released handles before dropping them. Useful to
/// audit that every removal releases exactly what it should.
#[derive(Debug, Default)]
pub struct CountingRelease {
    keys: Cell<usize>,
    values: Cell<usize>,
}

impl CountingRelease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> usize {
        self.keys.get()
    }

    pub fn values(&self) -> usize {
        self.values.get()
    }
}

impl<K, V> Release<K, V> for CountingRelease {
    fn release_key(&self, key: Rc<K>) {
        self.keys.set(self.keys.get() + 1);
        drop(key);
    }

    fn release_value(&self, value: Rc<V>) {
        self.values.set(self.values.get() + 1);
        drop(value);
    }
}

/// Hooks shared between containers (or kept by the caller for
/// inspection) work through an `Rc`.
impl<K, V, R: Release<K, V>> Release<K, V> for Rc<R> {
    #[inline]
    fn release_key(&self, key: Rc<K>) {
        (**self).release_key(key)
    }

    #[inline]
    fn release_value(&self, value: Rc<V>) {
        (**self).release_value(value)
    }
}

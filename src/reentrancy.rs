//! Re-entrancy support: a table epoch token and a debug-only guard.
//!
//! Key comparisons run user code while a lookup is in flight, and that
//! code may mutate the very container being searched. Lookups tolerate
//! this by recording the `Epoch` before each comparison and restarting
//! when it moved. Rebuilds never run user code; `DebugReentrancy` asserts
//! in debug builds that they are not nested. `Partners` records the
//! structural comparisons in flight so that a cyclic structure is
//! reported instead of recursing forever.

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;

/// Monotonic token advanced whenever the slot table is replaced
/// (rebuild, clear or teardown). Slot indices observed under one epoch
/// are meaningless under another.
#[derive(Debug)]
pub struct Epoch {
    current: Cell<u64>,
    _nosend: PhantomData<*mut ()>,
}

impl Epoch {
    pub const fn new() -> Self {
        Self {
            current: Cell::new(0),
            _nosend: PhantomData,
        }
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.current.get()
    }

    #[inline]
    pub fn advance(&self) {
        self.current.set(self.current.get().wrapping_add(1));
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance tracker for sections that must never be nested. Guard
/// them with `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub struct DebugReentrancy {
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
            _nosend: PhantomData,
        }
    }

    /// Enter a guarded section. In debug builds, panics if already entered.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let d = self.depth.get();
            assert!(d == 0, "reentrancy detected: nested table rebuild");
            self.depth.set(d + 1);
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard { _z: PhantomData }
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let d = self.owner.depth.get();
            debug_assert!(d > 0);
            self.owner.depth.set(d - 1);
        }
    }
}

/// Addresses of the containers this one is currently being compared
/// against. Seeing the same partner twice on one call stack means the
/// comparison loops through a cycle and would never finish.
#[derive(Debug, Default)]
pub struct Partners {
    active: RefCell<Vec<usize>>,
}

impl Partners {
    pub const fn new() -> Self {
        Self {
            active: RefCell::new(Vec::new()),
        }
    }

    /// Register `partner` for the duration of the returned guard, or
    /// `None` if it is already registered.
    pub fn enter(&self, partner: *const ()) -> Option<PartnerGuard<'_>> {
        let addr = partner as usize;
        let mut active = self.active.borrow_mut();
        if active.contains(&addr) {
            return None;
        }
        active.push(addr);
        Some(PartnerGuard { owner: self, addr })
    }
}

/// RAII guard returned by `Partners::enter`.
pub struct PartnerGuard<'a> {
    owner: &'a Partners,
    addr: usize,
}

impl Drop for PartnerGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.owner.active.borrow_mut();
        if let Some(pos) = active.iter().rposition(|&a| a == self.addr) {
            active.swap_remove(pos);
        }
    }
}

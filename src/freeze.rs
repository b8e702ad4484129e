//! FreezeGuard: the mutability lifecycle tied to hash computation.
//!
//! A container starts writable. The first successful hash computation
//! caches the value and freezes the container for good: every later
//! mutating call fails with `ImmutableViolation` before it has any side
//! effect, so outer tables that already indexed the container never see
//! its hash move.

use crate::error::PairsError;
use crate::hashing::{HashValue, UNSET};
use core::cell::Cell;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum HashState {
    #[default]
    Unset,
    /// A computation is running; reaching the guard again means the
    /// structure contains itself.
    Computing,
    Cached(HashValue),
}

#[derive(Debug, Default)]
pub struct FreezeGuard {
    state: Cell<HashState>,
}

/// Puts an unfinished computation back to `Unset` when it fails or
/// unwinds.
struct Pending<'a> {
    state: &'a Cell<HashState>,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.state.get() == HashState::Computing {
            self.state.set(HashState::Unset);
        }
    }
}

impl FreezeGuard {
    pub const fn new() -> Self {
        Self {
            state: Cell::new(HashState::Unset),
        }
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        matches!(self.state.get(), HashState::Cached(_))
    }

    #[inline]
    pub fn cached(&self) -> Option<HashValue> {
        match self.state.get() {
            HashState::Cached(h) => Some(h),
            _ => None,
        }
    }

    /// Policy check to run first thing in every mutating entry point.
    /// Mutation is also refused while the hash is being computed.
    #[inline]
    pub fn ensure_writable(&self, op: &'static str) -> Result<(), PairsError> {
        match self.state.get() {
            HashState::Unset => Ok(()),
            _ => Err(PairsError::ImmutableViolation { op }),
        }
    }

    /// Return the cached hash, or run `compute` and cache its result.
    ///
    /// A failing `compute` leaves the guard unfrozen. Re-entering while
    /// `compute` runs fails with `Unhashable { kind: "cyclic" }`.
    pub fn get_or_compute<F>(&self, compute: F) -> Result<HashValue, PairsError>
    where
        F: FnOnce() -> Result<HashValue, PairsError>,
    {
        match self.state.get() {
            HashState::Cached(h) => return Ok(h),
            HashState::Computing => {
                tracing::trace!("hash requested while computing it; structure is cyclic");
                return Err(PairsError::Unhashable { kind: "cyclic" });
            }
            HashState::Unset => {}
        }
        self.state.set(HashState::Computing);
        let _pending = Pending { state: &self.state };
        let h = compute()?;
        debug_assert_ne!(h, UNSET, "combiner must remap the unset sentinel");
        self.state.set(HashState::Cached(h));
        tracing::trace!(hash = h, "hash cached; container is now immutable");
        Ok(h)
    }
}

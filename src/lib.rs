//! frozen-pairs: a single-threaded open-addressing map that turns into an
//! immutable, hashable value the first time its hash is computed.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let a map be built incrementally, then be used as a key of
//!   another map (or as part of a larger structural value) without its
//!   hash ever changing underneath the tables that indexed it.
//! - Layers:
//!   - SlotTable<K, V>: a power-of-two array of `Unused | Tombstone |
//!     Active` slots with `fill`/`used` accounting. Minimum-size tables
//!     live inline.
//!   - probe: Knuth Algorithm D probe sequence and the re-entrancy
//!     tolerant lookup.
//!   - resize: the load-factor policy and the staged rebuild.
//!   - Pairs<K, V, R>: the public container. Insert, remove, merge,
//!     equality and the cached structural hash, with an `R: Release`
//!     hook receiving every handle the container gives up.
//!   - hashing: the deterministic combiners (pair, sequence, unordered).
//!   - Value / Expr: a small dynamic value model built on top.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (interior mutability, `Rc` handles).
//! - Keys and values are shared `Rc` handles; overwrites keep the
//!   original key handle in the slot.
//! - Hashes are `i64` with wrapping arithmetic; `-1` is reserved as the
//!   "not computed" sentinel and never produced by a combiner.
//! - Every probe terminates: the growth policy keeps at least one
//!   `Unused` slot in every table.
//!
//! Reentrancy policy and interior mutability
//! - All container methods take `&self`. The slot table sits in a
//!   `RefCell`, and no borrow is held while user code runs: key
//!   comparisons, key/value hashing, the release hook and `Drop` of
//!   released handles all happen outside it.
//! - A comparison may therefore insert, remove, clear, rebuild or freeze
//!   the container it was called from. Lookups snapshot an epoch token
//!   before comparing and restart if the table was replaced or the
//!   compared slot changed hands. Mutating calls re-check the freeze
//!   state after their lookup.
//! - Rebuilds never call user code; a debug-only guard asserts they are
//!   never nested.
//!
//! Freeze-on-hash
//! - `compute_hash` caches the structural hash. From then on every
//!   mutating entry point fails with `ImmutableViolation` before any side
//!   effect. Teardown and drop still release everything.
//! - While the hash is being computed the container is not writable
//!   either. A hash request that reaches the same container again (a
//!   structure that contains itself) fails with `Unhashable { kind:
//!   "cyclic" }` and leaves every container on the path unfrozen.
//! - `equals` remembers the containers it is being compared against; a
//!   nested comparison of the same pair fails with `ComparisonFailure`.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its key hash. Rebuilds and the container's own
//!   structural hash use the stored value; `PairKey::hash_key` is never
//!   invoked again after insertion.
//!
//! Notes and non-goals
//! - No iteration order guarantees; `items()` is a snapshot in slot order.
//! - No thread safety and no persistence.
//! - No allocation pooling of containers.

mod capability;
mod error;
mod expr;
mod freeze;
mod hashing;
mod pairs;
mod probe;
mod reentrancy;
mod release;
mod resize;
mod slot;
mod value;

// Public surface
pub use capability::{str_hash, Coefficient, PairKey, PairValue};
pub use error::PairsError;
pub use expr::Expr;
pub use freeze::FreezeGuard;
pub use hashing::{
    pair_hash, remap_intrinsic, sequence_hash, unordered_hash, HashValue, UnorderedHasher, UNSET,
};
pub use pairs::Pairs;
pub use probe::{ProbeSequence, PERTURB_SHIFT};
pub use release::{CountingRelease, DropRelease, Release};
pub use resize::{target_size, GROWTH_FACTOR, SHRINK_FACTOR, SHRINK_RATIO};
pub use slot::MIN_SIZE;
pub use value::{Value, ValueMap};

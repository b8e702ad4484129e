//! Structural hash combiner.
//!
//! Three combiners share one set of fixed constants:
//! - `pair_hash`: order-dependent hash of a (key, value) association.
//! - `sequence_hash`: order-dependent hash of an ordered sequence.
//! - `UnorderedHasher`: order-independent fold over association hashes,
//!   so that two containers holding the same associations hash alike no
//!   matter where the probe sequence placed them.
//!
//! All arithmetic is on `i64` and wraps; hash values are bit patterns,
//! not magnitudes. The constants must not change: cached hashes of
//! published containers depend on them.

use crate::error::PairsError;

/// Hash values are signed 64-bit words; `UNSET` is reserved.
pub type HashValue = i64;

/// Reserved bit pattern meaning "not computed yet".
pub const UNSET: HashValue = -1;

const SEED: HashValue = 0x345678;
const MULT: HashValue = 1_000_003;
const TAIL: HashValue = 97_531;
/// Replacement for an ordered combiner result that collides with `UNSET`.
const ORDERED_REMAP: HashValue = -2;

const UNORDERED_SEED: HashValue = 1_927_868_237;
const UNORDERED_SHUFFLE: HashValue = 89_869_747;
const UNORDERED_MULT: HashValue = 3_644_798_167;
const UNORDERED_FINAL_MULT: HashValue = 69_069;
const UNORDERED_FINAL_ADD: HashValue = 907_133_923;
/// Replacement for an unordered combiner result that collides with `UNSET`.
const UNORDERED_REMAP: HashValue = 590_923_713;

/// Map a legitimate intrinsic hash away from the reserved sentinel.
#[inline]
pub fn remap_intrinsic(h: HashValue) -> HashValue {
    if h == UNSET {
        ORDERED_REMAP
    } else {
        h
    }
}

/// Hash of a two-element association, identical to `sequence_hash` over
/// `[key_hash, value_hash]`.
pub fn pair_hash(key_hash: HashValue, value_hash: HashValue) -> HashValue {
    let mut mult = MULT;
    let mut h = (SEED ^ key_hash).wrapping_mul(mult);
    mult = mult.wrapping_add(82_522);
    h = (h ^ value_hash).wrapping_mul(mult);
    h = h.wrapping_add(TAIL);
    if h == UNSET {
        ORDERED_REMAP
    } else {
        h
    }
}

/// Order-dependent hash over already-hashed items.
///
/// Stops at the first failing item and returns its error.
pub fn sequence_hash<I>(items: I) -> Result<HashValue, PairsError>
where
    I: IntoIterator<Item = Result<HashValue, PairsError>>,
    I::IntoIter: ExactSizeIterator,
{
    let items = items.into_iter();
    let mut remaining = items.len() as HashValue;
    let mut mult = MULT;
    let mut x = SEED;
    for item in items {
        let y = item?;
        remaining -= 1;
        x = (x ^ y).wrapping_mul(mult);
        mult = mult.wrapping_add(82_520 + remaining + remaining);
    }
    x = x.wrapping_add(TAIL);
    if x == UNSET {
        x = ORDERED_REMAP;
    }
    Ok(x)
}

/// Running order-independent accumulator over association hashes.
///
/// Each association hash is shuffled before being xor-folded, so the
/// result does not depend on the order in which `add` is called.
#[derive(Debug, Clone, Copy)]
pub struct UnorderedHasher {
    acc: HashValue,
}

impl UnorderedHasher {
    /// Start a fold over `len` associations.
    pub fn new(len: usize) -> Self {
        Self {
            acc: UNORDERED_SEED.wrapping_mul((len as HashValue).wrapping_add(1)),
        }
    }

    #[inline]
    pub fn add(&mut self, h: HashValue) {
        let shuffled = (h ^ (h << 16) ^ UNORDERED_SHUFFLE).wrapping_mul(UNORDERED_MULT);
        self.acc ^= shuffled;
    }

    pub fn finish(self) -> HashValue {
        let h = self
            .acc
            .wrapping_mul(UNORDERED_FINAL_MULT)
            .wrapping_add(UNORDERED_FINAL_ADD);
        if h == UNSET {
            UNORDERED_REMAP
        } else {
            h
        }
    }
}

/// Order-independent hash over `(key_hash, value_hash)` associations.
pub fn unordered_hash<I>(pairs: I) -> Result<HashValue, PairsError>
where
    I: IntoIterator<Item = Result<(HashValue, HashValue), PairsError>>,
    I::IntoIter: ExactSizeIterator,
{
    let pairs = pairs.into_iter();
    let mut hasher = UnorderedHasher::new(pairs.len());
    for pair in pairs {
        let (kh, vh) = pair?;
        hasher.add(pair_hash(kh, vh));
    }
    Ok(hasher.finish())
}

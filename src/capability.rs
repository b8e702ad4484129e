//! Capability traits for stored keys and values.
//!
//! `PairKey` is the `{compare, hash}` contract a key type offers to the
//! table. `PairValue` supplies the structural hash of a stored value.
//! `Coefficient` is the arithmetic needed by the merge operations.

use crate::error::PairsError;
use crate::hashing::{remap_intrinsic, sequence_hash, HashValue};
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use rustc_hash::FxHasher;
use std::rc::Rc;

/// Key contract.
///
/// `compare` may have side effects, including mutating the container
/// that is calling it; lookups detect that and restart. It must not
/// change the identity or hash of either operand.
pub trait PairKey {
    /// Intrinsic hash. Must stay the same for the lifetime of the key.
    fn hash_key(&self) -> Result<HashValue, PairsError>;

    /// `Some(Equal)` means the keys are equal; `None` means unordered.
    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError>;
}

/// Stored-value contract: maps hash order-independently, sequences
/// hash in order, scalars use their intrinsic hash.
pub trait PairValue {
    fn structural_hash(&self) -> Result<HashValue, PairsError>;
}

/// Arithmetic used by `add_item`, `sub_item` and friends.
pub trait Coefficient: Sized {
    fn add(&self, other: &Self) -> Result<Self, PairsError>;
    fn sub(&self, other: &Self) -> Result<Self, PairsError>;
    fn mul(&self, other: &Self) -> Result<Self, PairsError>;
    fn neg(&self) -> Result<Self, PairsError>;
    fn is_zero(&self) -> bool;
}

/// Fixed-seed string hash, stable across runs and processes.
pub fn str_hash(s: &str) -> HashValue {
    let mut h = FxHasher::default();
    s.hash(&mut h);
    remap_intrinsic(h.finish() as HashValue)
}

macro_rules! int_capabilities {
    ($($t:ty),*) => {$(
        impl PairKey for $t {
            #[inline]
            fn hash_key(&self) -> Result<HashValue, PairsError> {
                Ok(remap_intrinsic(*self as HashValue))
            }

            #[inline]
            fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
                Ok(Some(self.cmp(other)))
            }
        }

        impl PairValue for $t {
            #[inline]
            fn structural_hash(&self) -> Result<HashValue, PairsError> {
                self.hash_key()
            }
        }

        impl Coefficient for $t {
            fn add(&self, other: &Self) -> Result<Self, PairsError> {
                Ok(self.wrapping_add(*other))
            }
            fn sub(&self, other: &Self) -> Result<Self, PairsError> {
                Ok(self.wrapping_sub(*other))
            }
            fn mul(&self, other: &Self) -> Result<Self, PairsError> {
                Ok(self.wrapping_mul(*other))
            }
            fn neg(&self) -> Result<Self, PairsError> {
                Ok(self.wrapping_neg())
            }
            fn is_zero(&self) -> bool {
                *self == 0
            }
        }
    )*};
}

int_capabilities!(i32, i64);

impl PairKey for bool {
    fn hash_key(&self) -> Result<HashValue, PairsError> {
        Ok(*self as HashValue)
    }

    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
        Ok(Some(self.cmp(other)))
    }
}

impl PairValue for bool {
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        self.hash_key()
    }
}

impl PairKey for String {
    fn hash_key(&self) -> Result<HashValue, PairsError> {
        Ok(str_hash(self))
    }

    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
        Ok(Some(self.cmp(other)))
    }
}

impl PairValue for String {
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        self.hash_key()
    }
}

impl PairKey for &'static str {
    fn hash_key(&self) -> Result<HashValue, PairsError> {
        Ok(str_hash(self))
    }

    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
        Ok(Some(self.cmp(other)))
    }
}

impl PairValue for &'static str {
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        self.hash_key()
    }
}

/// Ordered sequences hash like tuples of their elements.
impl<T: PairValue> PairValue for Vec<T> {
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        sequence_hash(self.iter().map(PairValue::structural_hash))
    }
}

impl<T: PairValue> PairValue for Rc<T> {
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        (**self).structural_hash()
    }
}

impl<T: PairKey> PairKey for Rc<T> {
    fn hash_key(&self) -> Result<HashValue, PairsError> {
        (**self).hash_key()
    }

    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
        if Rc::ptr_eq(self, other) {
            return Ok(Some(Ordering::Equal));
        }
        (**self).compare(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_hash_to_themselves_except_the_sentinel() {
        assert_eq!(42i64.hash_key().unwrap(), 42);
        assert_eq!((-5i32).hash_key().unwrap(), -5);
        assert_eq!((-1i64).hash_key().unwrap(), -2);
        assert_eq!((-1i64).hash_key(), (-2i64).hash_key());
    }

    #[test]
    fn string_hash_is_deterministic() {
        let a = "xyz".to_string();
        assert_eq!(a.hash_key().unwrap(), str_hash("xyz"));
        assert_eq!("xyz".hash_key().unwrap(), str_hash("xyz"));
        assert_ne!(str_hash("x"), str_hash("y"));
    }

    #[test]
    fn vectors_hash_in_order() {
        let a = vec![1i64, 2, 3].structural_hash().unwrap();
        let b = vec![3i64, 2, 1].structural_hash().unwrap();
        assert_ne!(a, b);
        assert_eq!(a, vec![1i64, 2, 3].structural_hash().unwrap());
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(i64::MAX.add(&1).unwrap(), i64::MIN);
        assert_eq!(3i64.sub(&3).unwrap(), 0);
        assert!(0i64.is_zero());
        assert_eq!(4i32.neg().unwrap(), -4);
        assert_eq!(6i64.mul(&7).unwrap(), 42);
    }
}

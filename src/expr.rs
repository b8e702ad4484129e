//! Expr: an immutable-once-hashed `(head, data)` node.
//!
//! The hash of an `Expr` is the pair hash of its head and the structural
//! hash of its data, so an `Expr` whose data is a map hashes the same as
//! any other `(head, map)` pair with equal contents. Computing it caches
//! the value and freezes both the `Expr` and, through the structural
//! hash, any map it carries.

use crate::capability::{PairKey, PairValue};
use crate::error::PairsError;
use crate::freeze::FreezeGuard;
use crate::hashing::{pair_hash, HashValue};
use crate::value::{Value, ValueMap};
use core::cmp::Ordering;

#[derive(Debug)]
pub struct Expr {
    head: Value,
    data: Value,
    freeze: FreezeGuard,
}

impl Expr {
    pub fn new(head: Value, data: Value) -> Self {
        Self {
            head,
            data,
            freeze: FreezeGuard::new(),
        }
    }

    /// Build from a positional argument list; exactly `[head, data]`.
    pub fn from_args(args: Vec<Value>) -> Result<Self, PairsError> {
        let got = args.len();
        match <[Value; 2]>::try_from(args) {
            Ok([head, data]) => Ok(Self::new(head, data)),
            Err(_) => Err(PairsError::Arity {
                op: "Expr",
                expected: 2,
                got,
            }),
        }
    }

    pub fn head(&self) -> &Value {
        &self.head
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn is_writable(&self) -> bool {
        !self.freeze.is_frozen()
    }

    pub fn cached_hash(&self) -> Option<HashValue> {
        self.freeze.cached()
    }

    pub fn compute_hash(&self) -> Result<HashValue, PairsError> {
        self.freeze.get_or_compute(|| {
            let head = self.head.hash_key()?;
            let data = self.data.structural_hash()?;
            Ok(pair_hash(head, data))
        })
    }

    /// Equal heads and equal data.
    pub fn equals(&self, other: &Expr) -> Result<bool, PairsError> {
        if core::ptr::eq(self, other) {
            return Ok(true);
        }
        if self.head.compare(&other.head)? != Some(Ordering::Equal) {
            return Ok(false);
        }
        Ok(self.data.compare(&other.data)? == Some(Ordering::Equal))
    }

    fn map_data(&self, op: &'static str) -> Result<&ValueMap, PairsError> {
        self.freeze.ensure_writable(op)?;
        self.data.as_map().ok_or(PairsError::TypeMismatch {
            op,
            expected: "map",
            got: self.data.kind(),
        })
    }

    fn other_map_data<'a>(op: &'static str, other: &'a Expr) -> Result<&'a ValueMap, PairsError> {
        other.data.as_map().ok_or(PairsError::TypeMismatch {
            op,
            expected: "map",
            got: other.data.kind(),
        })
    }

    pub fn add_item(&self, key: Value, value: Value) -> Result<(), PairsError> {
        self.map_data("add_item")?.add_item(key, value)
    }

    pub fn sub_item(&self, key: Value, value: Value) -> Result<(), PairsError> {
        self.map_data("sub_item")?.sub_item(key, value)
    }

    pub fn add_pairs(&self, other: &Expr) -> Result<(), PairsError> {
        let mine = self.map_data("add_pairs")?;
        mine.add_pairs(Self::other_map_data("add_pairs", other)?)
    }

    pub fn sub_pairs(&self, other: &Expr) -> Result<(), PairsError> {
        let mine = self.map_data("sub_pairs")?;
        mine.sub_pairs(Self::other_map_data("sub_pairs", other)?)
    }

    pub fn add_pairs_scaled(&self, other: &Expr, coeff: &Value) -> Result<(), PairsError> {
        let mine = self.map_data("add_pairs_scaled")?;
        mine.add_pairs_scaled(Self::other_map_data("add_pairs_scaled", other)?, coeff)
    }
}

impl PairKey for Expr {
    fn hash_key(&self) -> Result<HashValue, PairsError> {
        self.compute_hash()
    }

    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
        Ok(self.equals(other)?.then_some(Ordering::Equal))
    }
}

impl PairValue for Expr {
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        self.compute_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::str_hash;

    fn terms(items: &[(&str, i64)]) -> Value {
        let m = ValueMap::new();
        for (k, v) in items {
            m.insert(Value::from(*k), Value::from(*v)).unwrap();
        }
        Value::from(m)
    }

    #[test]
    fn construction_needs_exactly_two_arguments() {
        let err = Expr::from_args(vec![Value::from("ADD")]).unwrap_err();
        assert_eq!(
            err,
            PairsError::Arity {
                op: "Expr",
                expected: 2,
                got: 1
            }
        );
        assert!(Expr::from_args(vec![Value::from(1), Value::from(2), Value::from(3)]).is_err());
        let e = Expr::from_args(vec![Value::from("SYMBOL"), Value::from("x")]).unwrap();
        assert_eq!(e.head().kind(), "str");
        assert!(e.is_writable());
    }

    #[test]
    fn scalar_data_hashes_as_a_pair() {
        let e = Expr::new(Value::from("SYMBOL"), Value::from("x"));
        assert_eq!(
            e.compute_hash().unwrap(),
            pair_hash(str_hash("SYMBOL"), str_hash("x"))
        );
        assert!(!e.is_writable());
    }

    #[test]
    fn hashing_freezes_the_expr_and_its_map() {
        let e = Expr::new(Value::from("ADD"), terms(&[("x", 1)]));
        e.add_item(Value::from("y"), Value::from(2)).unwrap();
        let h = e.compute_hash().unwrap();
        assert!(!e.is_writable());
        assert!(!e.data().as_map().unwrap().is_writable());

        let err = e.add_item(Value::from("z"), Value::from(3)).unwrap_err();
        assert!(err.is_immutable_violation());
        assert_eq!(e.compute_hash().unwrap(), h);
    }

    #[test]
    fn merge_forwarding_needs_map_data() {
        let e = Expr::new(Value::from("SYMBOL"), Value::from("x"));
        let err = e.add_item(Value::from("y"), Value::from(1)).unwrap_err();
        assert_eq!(
            err,
            PairsError::TypeMismatch {
                op: "add_item",
                expected: "map",
                got: "str"
            }
        );
    }

    #[test]
    fn merging_expressions_combines_their_terms() {
        let a = Expr::new(Value::from("ADD"), terms(&[("x", 1), ("y", 2)]));
        let b = Expr::new(Value::from("ADD"), terms(&[("x", -1), ("z", 4)]));
        a.add_pairs(&b).unwrap();
        let data = a.data().as_map().unwrap();
        assert!(!data.contains_key(&Value::from("x")).unwrap());
        assert_eq!(data.len(), 2);

        a.add_pairs_scaled(&b, &Value::from(2)).unwrap();
        assert_eq!(
            data.get(&Value::from("z")).unwrap().unwrap().as_int(),
            Some(12)
        );
        a.sub_pairs(&b).unwrap();
        assert_eq!(
            data.get(&Value::from("x")).unwrap().unwrap().as_int(),
            Some(-1)
        );
    }

    #[test]
    fn equal_expressions_hash_equally_regardless_of_term_order() {
        let a = Expr::new(Value::from("ADD"), terms(&[("x", 1), ("y", 2)]));
        let b = Expr::new(Value::from("ADD"), terms(&[("y", 2), ("x", 1)]));
        assert!(a.equals(&b).unwrap());
        assert_eq!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
        let c = Expr::new(Value::from("MUL"), terms(&[("x", 1), ("y", 2)]));
        assert!(!a.equals(&c).unwrap());
    }

    #[test]
    fn expressions_key_maps() {
        let m = ValueMap::new();
        let e = Value::from(Expr::new(Value::from("ADD"), terms(&[("x", 1)])));
        m.insert(e.clone(), Value::from(3)).unwrap();
        let probe = Value::from(Expr::new(Value::from("ADD"), terms(&[("x", 1)])));
        assert_eq!(m.get(&probe).unwrap().unwrap().as_int(), Some(3));
        assert!(!e.as_expr().unwrap().is_writable());
    }
}

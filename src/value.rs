//! Value: a small dynamic value model for nested structures.
//!
//! `Value` implements both capability traits, so it can be a key and a
//! value at once: maps of maps, sequences of maps and `Expr` nodes all hash
//! structurally. Hashing a `Map` (directly or through an enclosing
//! sequence or `Expr`) freezes it.

use crate::capability::{str_hash, Coefficient, PairKey, PairValue};
use crate::error::PairsError;
use crate::expr::Expr;
use crate::hashing::{sequence_hash, HashValue};
use crate::pairs::Pairs;
use core::cmp::Ordering;
use std::rc::Rc;

pub type ValueMap = Pairs<Value, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Str(Rc<str>),
    Seq(Rc<[Value]>),
    Map(Rc<ValueMap>),
    Expr(Rc<Expr>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
            Value::Expr(_) => "expr",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(&**m),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Expr(e) => Some(&**e),
            _ => None,
        }
    }

    fn as_int_for(&self, op: &'static str) -> Result<i64, PairsError> {
        self.as_int().ok_or(PairsError::TypeMismatch {
            op,
            expected: "int",
            got: self.kind(),
        })
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(Rc::from(items))
    }
}

impl From<ValueMap> for Value {
    fn from(m: ValueMap) -> Self {
        Value::Map(Rc::new(m))
    }
}

impl From<Rc<ValueMap>> for Value {
    fn from(m: Rc<ValueMap>) -> Self {
        Value::Map(m)
    }
}

impl From<Expr> for Value {
    fn from(e: Expr) -> Self {
        Value::Expr(Rc::new(e))
    }
}

impl PairKey for Value {
    fn hash_key(&self) -> Result<HashValue, PairsError> {
        match self {
            Value::Int(i) => i.hash_key(),
            Value::Str(s) => Ok(str_hash(s)),
            Value::Seq(items) => sequence_hash(items.iter().map(PairKey::hash_key)),
            Value::Map(m) => m.compute_hash(),
            Value::Expr(e) => e.compute_hash(),
        }
    }

    fn compare(&self, other: &Self) -> Result<Option<Ordering>, PairsError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::Seq(a), Value::Seq(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Some(Ordering::Equal) => {}
                        unequal => return Ok(unequal),
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(Some(Ordering::Equal));
                }
                Ok(a.equals(&**b)?.then_some(Ordering::Equal))
            }
            (Value::Expr(a), Value::Expr(b)) => Ok(a.equals(b)?.then_some(Ordering::Equal)),
            _ => Ok(None),
        }
    }
}

impl PairValue for Value {
    fn structural_hash(&self) -> Result<HashValue, PairsError> {
        self.hash_key()
    }
}

/// Only integers carry coefficient arithmetic.
impl Coefficient for Value {
    fn add(&self, other: &Self) -> Result<Self, PairsError> {
        let a = self.as_int_for("add")?;
        let b = other.as_int_for("add")?;
        Ok(Value::Int(a.wrapping_add(b)))
    }

    fn sub(&self, other: &Self) -> Result<Self, PairsError> {
        let a = self.as_int_for("sub")?;
        let b = other.as_int_for("sub")?;
        Ok(Value::Int(a.wrapping_sub(b)))
    }

    fn mul(&self, other: &Self) -> Result<Self, PairsError> {
        let a = self.as_int_for("mul")?;
        let b = other.as_int_for("mul")?;
        Ok(Value::Int(a.wrapping_mul(b)))
    }

    fn neg(&self) -> Result<Self, PairsError> {
        Ok(Value::Int(self.as_int_for("neg")?.wrapping_neg()))
    }

    fn is_zero(&self) -> bool {
        matches!(self, Value::Int(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::pair_hash;

    fn map(items: &[(&str, i64)]) -> ValueMap {
        let m = ValueMap::new();
        for (k, v) in items {
            m.insert(Value::from(*k), Value::from(*v)).unwrap();
        }
        m
    }

    #[test]
    fn sequence_of_two_hashes_like_a_pair() {
        let seq = Value::from(vec![Value::from("x"), Value::from(1)]);
        let expected = pair_hash(str_hash("x"), 1);
        assert_eq!(seq.hash_key().unwrap(), expected);
    }

    #[test]
    fn nested_map_hashes_order_independently_and_freezes() {
        let inner_a = Rc::new(map(&[("x", 1), ("y", 2)]));
        let inner_b = Rc::new(map(&[("y", 2), ("x", 1)]));
        let a = Value::from(Rc::clone(&inner_a));
        let b = Value::from(Rc::clone(&inner_b));
        assert_eq!(a.hash_key().unwrap(), b.hash_key().unwrap());
        assert!(!inner_a.is_writable());
        assert_eq!(a.compare(&b).unwrap(), Some(Ordering::Equal));
    }

    #[test]
    fn maps_can_key_other_maps() {
        let outer = ValueMap::new();
        let key = Value::from(map(&[("x", 1)]));
        outer.insert(key.clone(), Value::from(7)).unwrap();

        let probe = Value::from(map(&[("x", 1)]));
        assert_eq!(outer.get(&probe).unwrap().unwrap().as_int(), Some(7));
        assert!(!key.as_map().unwrap().is_writable());
    }

    #[test]
    fn mixed_kinds_are_unordered() {
        assert_eq!(Value::from(1).compare(&Value::from("1")).unwrap(), None);
        assert_eq!(
            Value::from(vec![Value::from(1)])
                .compare(&Value::from(vec![Value::from(1), Value::from(2)]))
                .unwrap(),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn arithmetic_needs_integers() {
        assert_eq!(Value::from(2).add(&Value::from(3)).unwrap().as_int(), Some(5));
        let err = Value::from("a").add(&Value::from(1)).unwrap_err();
        assert_eq!(
            err,
            PairsError::TypeMismatch {
                op: "add",
                expected: "int",
                got: "str"
            }
        );
        assert!(Value::from(0).is_zero());
        assert!(!Value::from("0").is_zero());
    }

    #[test]
    fn string_values_merge_as_type_errors() {
        let m = ValueMap::new();
        m.insert(Value::from("k"), Value::from("text")).unwrap();
        let err = m.add_item(Value::from("k"), Value::from(1)).unwrap_err();
        assert!(matches!(err, PairsError::TypeMismatch { got: "str", .. }));
        assert_eq!(m.len(), 1);
    }
}

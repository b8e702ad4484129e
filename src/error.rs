//! Error type shared by every layer of the crate.

use thiserror::Error;

/// Failure modes of table operations, hashing and the `Expr` wrapper.
///
/// Every variant aborts the operation that produced it; the container is
/// left in the state it had before the call (or, for allocation failures
/// during a policy-driven rebuild, in its last consistent state).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairsError {
    /// Wrong number of construction arguments.
    #[error("{op} takes {expected} arguments ({got} given)")]
    Arity {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    /// A key comparison callback reported failure.
    #[error("key comparison failed: {reason}")]
    ComparisonFailure { reason: String },

    /// A mutating call was made after the hash had been cached.
    #[error("{op}: data is not writable")]
    ImmutableViolation { op: &'static str },

    /// A table of the requested size could not be allocated.
    #[error("could not allocate a table of {slots} slots")]
    AllocationFailure { slots: usize },

    /// The operation needs a map-shaped (or numeric) value.
    #[error("{op}: expected {expected}, got {got}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    /// A key or value has no hash.
    #[error("unhashable value of kind {kind}")]
    Unhashable { kind: &'static str },
}

impl PairsError {
    /// Convenience constructor for comparison callbacks.
    pub fn comparison(reason: impl Into<String>) -> Self {
        PairsError::ComparisonFailure {
            reason: reason.into(),
        }
    }

    /// True for the freeze-on-hash policy violation.
    pub fn is_immutable_violation(&self) -> bool {
        matches!(self, PairsError::ImmutableViolation { .. })
    }
}

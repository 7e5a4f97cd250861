//! Error types shared by both engines.

use thiserror::Error;

/// Precondition violations and configuration errors.
///
/// Engines check these before mutating anything, so an `Err` always
/// leaves the structure untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    #[error("cursor is at the end position")]
    EndPosition,
    #[error("cursor refers to a node that is no longer in this structure")]
    StalePosition,
    #[error("load factor must be finite and at least 0.01, got {0}")]
    InvalidLoadFactor(f32),
}

/// Structural invariant failures reported by `check()`.
///
/// Tree paths are spelled from the root as a sequence of `L`/`R` steps,
/// so `"LR"` is the right child of the root's left child.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("root is red")]
    RootNotBlack,
    #[error("red node at {path:?} has a red child")]
    RedRed { path: String },
    #[error("black height mismatch under {path:?}: left {left}, right {right}")]
    BlackHeight {
        path: String,
        left: usize,
        right: usize,
    },
    #[error("ordering violated at {path:?}")]
    Order { path: String },
    #[error("equal values stored at {path:?} while duplicates are rejected")]
    Duplicate { path: String },
    #[error("parent link of {path:?} does not point back at its parent")]
    ParentLink { path: String },
    #[error("count is {expected} but {found} elements are reachable")]
    Count { expected: usize, found: usize },
    #[error("element in bucket {bucket} hashes to another bucket")]
    Misplaced { bucket: usize },
    #[error("chain of bucket {bucket} is not a consistent circular list")]
    BrokenChain { bucket: usize },
    #[error("{count} elements exceed the load factor of {capacity} buckets")]
    LoadFactor { count: usize, capacity: usize },
    #[error("equal elements in bucket {bucket} are not contiguous")]
    SplitRun { bucket: usize },
}

//! chain-tree: the two engines under a collections library, a red-black
//! tree and a chained hash table, both with stable cursors.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the only non-trivial algorithms of a collections library
//!   (tree rebalancing and hash chaining) in two small engines that typed
//!   containers (sets, maps, multisets) can wrap without re-deriving any
//!   invariant.
//! - Layers:
//!   - `link` / `rb_node`: node primitives. Links and tree nodes live in
//!     slot arenas and point at each other by generational key. Every
//!     link mutation goes through one helper that updates both directions.
//!   - `HashTable<T, S, U>`: vector of bucket heads, each a circular chain
//!     of links; resizes by relinking.
//!   - `RbTree<T, C, U>`: sentinel-anchored red-black tree; removal swaps
//!     tree positions rather than values.
//!   - `Cursors`: the cursor model both engines expose (begin, end,
//!     advance, retreat, get) and a generic borrowing iterator.
//!
//! Constraints
//! - Single-threaded and synchronous: engines are `!Send`/`!Sync`, every
//!   call runs to completion, there is no internal locking.
//! - Each engine exclusively owns its nodes. `Clone` deep-copies the arena.
//! - Cursors are plain keys. They stay valid until their own element is
//!   removed; afterwards they resolve to nothing and mutating calls report
//!   `Error::StalePosition`.
//! - Mutation while iterating goes through `purge`, which lets the visitor
//!   decide remove-or-keep and advances safely.
//! - Reentrancy: user code (comparators, `Hash`/`Eq`, update and purge
//!   callbacks) must not call back into the engine that invoked it. Debug
//!   builds panic; release builds do not check.
//!
//! Policies
//! - `Duplicates::Reject`: one element per key; a second `add` hands the
//!   incoming value to the engine's `Update` strategy and returns `false`.
//! - `Duplicates::Allow`: every `add` inserts. Equal elements are adjacent
//!   in iteration order (in-order for the tree, within one bucket chain for
//!   the table), which `count_all`/`remove_all` rely on.
//!
//! Failure model
//! - Precondition violations (end or stale cursor, bad load factor) are
//!   `Err(Error)` and leave the structure untouched.
//! - A malformed comparator or hash produces a valid-but-wrong shape, not
//!   memory unsafety. `check()` on either engine finds it and names the
//!   node (by `L`/`R` path) or bucket at fault; it is meant for tests.
//! - `intersect` is a destructive rebuild, not a transaction.

pub mod cursor;
pub mod error;
pub mod hash_table;
#[cfg(test)]
mod hash_table_proptest;
mod link;
pub mod policy;
mod rb_node;
pub mod rb_tree;
#[cfg(test)]
mod rb_tree_proptest;
mod reentrancy;

// Public surface
pub use cursor::{Cursors, Iter};
pub use error::{Error, Violation};
pub use hash_table::{HashConfig, HashTable, Position};
pub use link::LinkKey;
pub use policy::{Compare, Duplicates, Keep, Natural, Replace, Update};
pub use rb_node::NodeKey;
pub use rb_tree::{Cursor, RbTree, TreeConfig};
pub use reentrancy::DebugReentrancy;

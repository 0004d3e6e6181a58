//! rehash-dict: a single-threaded chained hash dictionary that grows and
//! shrinks incrementally, so no single operation pays for a full rehash.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: predictable latency for large in-memory keyspaces. A resize
//!   allocates the new table and then migrates one bucket at a time, piggy-
//!   backed on ordinary operations or driven by the host with a time budget.
//! - Pieces:
//!   - `table`: power-of-two bucket arrays of chain heads. Entries live in
//!     one generational arena and carry their cached hash and `next` link;
//!     migration only relinks arena keys.
//!   - `dict`: the two-table dictionary, its growth rules and the rehash
//!     cursor. Public operations return stable [`Handle`]s.
//!   - `iter`: a borrowing iterator and a detached "safe" cursor that may
//!     be advanced between modifications.
//!   - `dict_type`: the [`DictType`] capability set (hash, equality, dup and
//!     destroy hooks) plus ready-made descriptors.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync`; no atomics or locks.
//! - Keys are unique; adding an existing key fails.
//! - Capacities are powers of two; bucket = `hash & (capacity - 1)`.
//! - The type's `hash` runs once per insert and once per probe, never
//!   during migration.
//!
//! Rehashing
//! - While migrating, `tables[0]` is the source and `tables[1]` the target.
//!   New keys always go to the target, lookups probe both.
//! - Each `find`, `add`, `replace`, `delete` and `random_entry` first
//!   migrates one bucket unless a safe iterator is live.
//! - Growth starts when `len >= capacity` and resizing is allowed, or when
//!   `len / capacity` exceeds the forced ratio regardless of the policy.
//!   The target holds twice the current entries.
//!
//! Iteration
//! - [`Iter`] borrows the dictionary; the borrow checker rules out
//!   modification during the walk.
//! - [`SafeIter`] registers with the dictionary on its first step and
//!   suspends opportunistic migration until released. Dropping it while
//!   registered panics, because a lost registration would disable
//!   migration for good.
//!
//! Reentrancy
//! - Type callbacks run while chains are being walked. Debug builds panic
//!   if `hash` or `key_eq` reaches back into the same dictionary.
//!
//! Notes and non-goals
//! - Random sampling picks a bucket, then a chain position, so keys in long
//!   chains are under-sampled.
//! - No thread safety, persistence or ordered iteration.

mod config;
mod dict;
mod dict_proptest;
mod dict_type;
mod error;
pub mod hash;
mod iter;
mod reentrancy;
mod stats;
mod table;
#[cfg(test)]
mod test_logger;
mod tokens;

pub use config::{
    DictConfig, ResizePolicy, DEFAULT_FORCE_RESIZE_RATIO, DEFAULT_INITIAL_SIZE, DEFAULT_REHASH_BATCH,
};
pub use dict::{Dict, Handle, VacantEntry};
pub use dict_type::{DefaultType, DictType, IntType, StringType};
pub use error::DictError;
pub use iter::{Iter, IterMut, SafeIter};
pub use stats::{DictStats, TableStats, STATS_VECTLEN};

/// Dictionary over any `K: Hash + Eq`.
pub type HashDict<K, V, S = hashbrown::hash_map::DefaultHashBuilder> = Dict<DefaultType<K, V, S>>;

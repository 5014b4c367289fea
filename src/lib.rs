//! hybrid-hashtable: a hash table whose buckets are linked chains while
//! short and red-black trees once they fill up, so a pile of colliding
//! values costs O(log n) per lookup instead of O(n).
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a single-threaded table with duplicate-accepting (`*_multi`) and
//!   duplicate-rejecting (`*_unique`) operations, built from small layers
//!   whose invariants can be checked on their own.
//! - Layers:
//!   - `chain` / `rb_tree`: node primitives over two `slotmap` arenas.
//!     Chains link, unlink and search; trees add rotations, insert and
//!     erase fixups, bounds and a parent-safe post-order teardown. Neither
//!     hashes anything.
//!   - `bucket`: the `Bucket` sum type (`Empty`, `Chain`, `Tree`) and the
//!     per-bucket protocol: find, count, place a node multi- or
//!     unique-style, detach, treeify, untreeify.
//!   - `hash_table` / `rehash`: hashing, bucket selection
//!     (`hash & (bucket_count - 1)`), growth and the public API.
//!   - `cursor`: positions that outlive borrows, and iterators.
//!
//! Constraints
//! - Bucket count is a power of two and only grows.
//! - `len <= bucket_count * max_load_factor` holds after every insertion.
//! - A chain holds fewer than `treeify_threshold` nodes; reaching it turns
//!   the bucket into a tree. A tree that an erase leaves below
//!   `untreeify_threshold` turns back into a chain (configurable).
//! - Equal values inside a chain form one contiguous run.
//! - No `unsafe`.
//!
//! Ownership
//! - Nodes live in the arenas; a bucket holds the key of its head or root.
//!   Each node is reachable from exactly one bucket. Converting a bucket
//!   allocates in the other arena and frees the source node, so a node is
//!   never owned twice. Tree parent links are traversal aids only.
//!
//! Cursors and invalidation
//! - A `Cursor` records bucket index, arena key, the issuing table's
//!   identity and its rehash epoch. It borrows nothing and is validated on
//!   use; another table, a clone included, never honors it.
//! - Erasing a node invalidates cursors to that node only: tree erasure
//!   moves nodes, never values. A conversion frees the converted nodes,
//!   which retires cursors into that bucket. Any rehash retires every
//!   cursor. Generational keys make a stale cursor resolve to nothing
//!   rather than to a newer node.
//!
//! Strategies
//! - `S: BuildHasher` picks the bucket, `C: Comparator<T>` orders tree
//!   buckets, `P: EqPredicate<T>` matches in chain buckets. `C` and `P` must
//!   agree on equality and, with `cache_hash` on, the hash of a stored value
//!   must not change. Both are preconditions, not checked.
//!
//! Reentrancy policy
//! - Strategies run while buckets may be half-linked. Debug builds track
//!   the running operation and panic on nested entry from a strategy.
//! - The table is single-threaded: neither `Send` nor `Sync`.
//!
//! Failure model
//! - Duplicate and absent keys are reported through return values.
//! - `try_rehash` / `try_reserve` return `TableError` and leave the table
//!   untouched: the new bucket array is allocated before any node moves.
//!   Their infallible twins and growth on insert panic instead.
//!
//! Logging
//! - `tracing` events: `debug` when the bucket array grows, `trace` for
//!   each bucket conversion. The crate installs no subscriber.
//!
//! ```
//! use hybrid_hashtable::HashTable;
//!
//! let mut t: HashTable<&str> = HashTable::new();
//! t.insert_multi("a");
//! t.insert_multi("a");
//! assert!(!t.insert_unique("a").1);
//! assert_eq!(t.count_multi(&"a"), 2);
//! assert_eq!(t.erase_multi(&"a"), 2);
//! assert!(t.is_empty());
//! ```

mod bucket;
mod chain;
pub mod config;
mod cursor;
pub mod error;
mod hash_table;
#[cfg(test)]
mod hash_table_proptest;
mod rb_tree;
mod reentrancy;
mod rehash;
pub mod strategy;

// Public surface
pub use bucket::BucketKind;
pub use config::{TableConfig, TableConfigBuilder};
pub use cursor::{BucketIter, Cursor, Iter};
pub use error::TableError;
pub use hash_table::HashTable;
pub use strategy::{Comparator, EqPredicate, NaturalEq, NaturalOrder};

//! Rehash engine and load-factor policy.
//!
//! The bucket array only grows. A rehash allocates the new array first, so
//! an allocation failure leaves the table untouched, then drains every old
//! bucket node by node into the new one. Chain buckets drain from the head;
//! tree buckets drain leaf-first so no node is moved while a child still
//! points at it. Every node is relinked with multi placement: uniqueness
//! already holds and only bucket indices change. A node that lands in a
//! bucket of the other representation is converted, and a chain that grows
//! to the treeify threshold is treeified on the spot.

use crate::bucket::{Bucket, NodeRef};
use crate::config::MAX_BUCKETS;
use crate::error::TableError;
use crate::hash_table::HashTable;
use crate::strategy::{Comparator, EqPredicate};
use core::hash::{BuildHasher, Hash};

impl<T, S, C, P> HashTable<T, S, C, P>
where
    T: Hash,
    S: BuildHasher,
    C: Comparator<T>,
    P: EqPredicate<T>,
{
    /// Grow to at least `n` buckets (rounded up to a power of two). Never
    /// shrinks. Panics if the bucket count overflows or cannot be
    /// allocated; see [`try_rehash`](Self::try_rehash).
    pub fn rehash(&mut self, n: usize) {
        if let Err(e) = self.try_rehash(n) {
            panic!("hash table rehash to {n} buckets failed: {e}");
        }
    }

    /// Fallible [`rehash`](Self::rehash). On error the table is unchanged.
    pub fn try_rehash(&mut self, n: usize) -> Result<(), TableError> {
        let _g = self.guard.enter("rehash");
        self.rehash_to(n)
    }

    /// Make room for `n` buckets; a no-op when `n <= bucket_count()`.
    pub fn reserve(&mut self, n: usize) {
        if n > self.bucket_count() {
            self.rehash(n);
        }
    }

    /// Fallible [`reserve`](Self::reserve). On error the table is
    /// unchanged.
    pub fn try_reserve(&mut self, n: usize) -> Result<(), TableError> {
        if n > self.bucket_count() {
            self.try_rehash(n)
        } else {
            Ok(())
        }
    }

    /// Change the load-factor limit. A lower limit is enforced from the
    /// next insertion on.
    pub fn set_max_load_factor(&mut self, mlf: f32) -> Result<(), TableError> {
        self.config.set_max_load_factor(mlf)
    }

    /// Whether `additional` more values would push the load factor over
    /// the limit.
    pub(crate) fn needs_growth(&self, additional: usize) -> bool {
        let limit = self.bucket_count() as f64 * f64::from(self.config.max_load_factor());
        self.len.saturating_add(additional) as f64 > limit
    }

    /// Grow for one more value: double, or more when the limit demands it.
    /// Never asks for more than [`MAX_BUCKETS`].
    pub(crate) fn grow_for_insert(&mut self) {
        let wanted = (self.len.saturating_add(1) as f64
            / f64::from(self.config.max_load_factor()))
        .ceil()
        .min(MAX_BUCKETS as f64) as usize;
        let target = wanted
            .max(self.bucket_count().saturating_mul(2))
            .min(MAX_BUCKETS);
        if let Err(e) = self.rehash_to(target) {
            panic!("hash table growth to {target} buckets failed: {e}");
        }
    }

    fn rehash_to(&mut self, n: usize) -> Result<(), TableError> {
        let target = n
            .max(1)
            .checked_next_power_of_two()
            .filter(|&t| t <= MAX_BUCKETS)
            .ok_or(TableError::CapacityOverflow { requested: n })?;
        if target <= self.buckets.len() {
            return Ok(());
        }
        let mut fresh = Vec::new();
        fresh.try_reserve_exact(target)?;
        fresh.resize(target, Bucket::Empty);

        tracing::debug!(
            from = self.buckets.len(),
            to = target,
            len = self.len,
            "growing bucket array"
        );
        let old = core::mem::replace(&mut self.buckets, fresh);
        for bucket in old {
            match bucket {
                Bucket::Empty => {}
                Bucket::Chain { head, .. } => {
                    let mut head = Some(head);
                    while let Some(c) = self.nodes.chains.pop_front(&mut head) {
                        self.relink(NodeRef::Chain(c));
                    }
                }
                Bucket::Tree { root, .. } => {
                    let mut at = Some(root);
                    while let Some(t) = self.nodes.trees.take_leaf(&mut at) {
                        self.relink(NodeRef::Tree(t));
                    }
                }
            }
        }
        self.epoch = self.epoch.wrapping_add(1);
        Ok(())
    }

    /// Place a detached node in its bucket of the current array.
    fn relink(&mut self, node: NodeRef) {
        let hash = match self.nodes.cached_hash(node) {
            Some(h) => h,
            None => self.make_hash(self.nodes.value(node)),
        };
        let idx = self.index_of(hash);
        let placed = self.nodes.place_multi(
            &mut self.buckets[idx],
            node,
            &self.comparator,
            &self.predicate,
            self.config.treeify_threshold(),
        );
        self.note_placement(idx, &placed);
    }
}

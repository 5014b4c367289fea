//! HashTable: power-of-two buckets, each a chain or a red-black tree.

use crate::bucket::{Bucket, BucketKind, NodeRef, NodeStore, Placed};
use crate::config::TableConfig;
use crate::cursor::{self, BucketIter, Cursor, Iter};
use crate::reentrancy::CallbackGuard;
use crate::strategy::{Comparator, EqPredicate, NaturalEq, NaturalOrder};
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::hash_map::DefaultHashBuilder;

/// Identity handed to each new table (and each clone) so a cursor is only
/// honored by the table that issued it.
fn next_table_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Hash table holding values of type `T`, with duplicate-accepting
/// (`*_multi`) and duplicate-rejecting (`*_unique`) operations side by side.
///
/// - `S` hashes values and picks the bucket (`hash & (bucket_count - 1)`).
/// - `C` orders values inside tree buckets.
/// - `P` matches values inside chain buckets.
///
/// `C` and `P` must agree: `compare(a, b) == Equal` exactly when
/// `equals(a, b)`. The table does not check this.
pub struct HashTable<T, S = DefaultHashBuilder, C = NaturalOrder, P = NaturalEq> {
    pub(crate) buckets: Vec<Bucket>,
    pub(crate) nodes: NodeStore<T>,
    pub(crate) len: usize,
    pub(crate) id: u64,
    // Bumped by every rehash; cursors from an older epoch are stale.
    pub(crate) epoch: u64,
    pub(crate) hasher: S,
    pub(crate) comparator: C,
    pub(crate) predicate: P,
    pub(crate) config: TableConfig,
    pub(crate) guard: CallbackGuard,
}

impl<T> HashTable<T>
where
    T: Hash + Ord,
{
    /// Create an empty table with the default configuration: 16 buckets,
    /// load factor 1.0, treeify at 8 and untreeify below 6.
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    /// Create an empty table with `config` and the default strategies.
    pub fn with_config(config: TableConfig) -> Self {
        Self::with_strategies(config, DefaultHashBuilder::default(), NaturalOrder, NaturalEq)
    }
}

impl<T> Default for HashTable<T>
where
    T: Hash + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> HashTable<T, S>
where
    T: Hash + Ord,
    S: BuildHasher,
{
    /// Create an empty table with the default configuration that hashes
    /// with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_strategies(TableConfig::default(), hasher, NaturalOrder, NaturalEq)
    }
}

impl<T, S, C, P> HashTable<T, S, C, P> {
    /// Build a table from a configuration and the three strategies.
    pub fn with_strategies(config: TableConfig, hasher: S, comparator: C, predicate: P) -> Self {
        Self {
            buckets: vec![Bucket::Empty; config.bucket_count()],
            nodes: NodeStore::new(),
            len: 0,
            id: next_table_id(),
            epoch: 0,
            hasher,
            comparator,
            predicate,
            config,
            guard: CallbackGuard::new(),
        }
    }

    /// Number of values stored, duplicates included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets; always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// `len / bucket_count`.
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.buckets.len() as f32
    }

    /// Load factor above which the next insert grows the bucket array.
    pub fn max_load_factor(&self) -> f32 {
        self.config.max_load_factor()
    }

    /// Configuration in effect, including any later
    /// [`set_max_load_factor`](Self::set_max_load_factor).
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// The hasher that picks buckets.
    pub fn hash_function(&self) -> &S {
        &self.hasher
    }

    /// The order used inside tree buckets.
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// The equality used inside chain buckets.
    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// Number of values in bucket `n`. Panics if `n >= bucket_count()`.
    pub fn bucket_size(&self, n: usize) -> usize {
        self.buckets[n].len()
    }

    /// Representation of bucket `n`. Panics if `n >= bucket_count()`.
    pub fn bucket_kind(&self, n: usize) -> BucketKind {
        self.buckets[n].kind()
    }

    /// Values of bucket `n`: chain order for a chain, comparator order for
    /// a tree. Panics if `n >= bucket_count()`.
    pub fn bucket_values(&self, n: usize) -> BucketIter<'_, T> {
        BucketIter::new(&self.buckets[n], &self.nodes)
    }

    /// Iterate over every value, bucket by bucket, in the same order as a
    /// [`begin`](Self::begin)/[`next`](Self::next) walk.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(&self.buckets, &self.nodes, self.len)
    }

    /// Cursor at the first value, or [`end`](Self::end) when empty.
    pub fn begin(&self) -> Cursor {
        self.cursor_from(0)
    }

    /// The past-the-end cursor.
    pub fn end(&self) -> Cursor {
        Cursor::end(self.buckets.len(), self.id, self.epoch)
    }

    /// Value under `pos`; `None` for the end cursor and for stale cursors.
    pub fn get(&self, pos: Cursor) -> Option<&T> {
        self.resolve(pos).map(|n| self.nodes.value(n))
    }

    /// Cursor after `pos`. Stepping the end cursor or a stale cursor
    /// yields the end cursor.
    pub fn next(&self, pos: Cursor) -> Cursor {
        match self.resolve(pos) {
            Some(n) => self.cursor_after(pos.bucket, n),
            None => self.end(),
        }
    }

    /// Drop every value. The bucket count is kept.
    pub fn clear(&mut self) {
        let _g = self.guard.enter("clear");
        for bucket in self.buckets.iter_mut() {
            self.nodes.destroy(bucket);
        }
        self.len = 0;
    }

    /// Exchange contents with `other`. Cursors follow the values they point
    /// at into the other table.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    /// Node named by `pos` if it is still live in this table's current
    /// layout.
    pub(crate) fn resolve(&self, pos: Cursor) -> Option<NodeRef> {
        let n = pos.node?;
        let live = pos.owner == self.id
            && pos.epoch == self.epoch
            && pos.bucket < self.buckets.len()
            && self.nodes.contains(n);
        live.then_some(n)
    }

    pub(crate) fn cursor_at(&self, bucket: usize, node: NodeRef) -> Cursor {
        Cursor::at(bucket, node, self.id, self.epoch)
    }

    pub(crate) fn cursor_from(&self, bucket: usize) -> Cursor {
        match cursor::first_from(&self.buckets, &self.nodes, bucket) {
            Some((b, n)) => self.cursor_at(b, n),
            None => self.end(),
        }
    }

    pub(crate) fn cursor_after(&self, bucket: usize, node: NodeRef) -> Cursor {
        match cursor::step(&self.buckets, &self.nodes, bucket, node) {
            Some((b, n)) => self.cursor_at(b, n),
            None => self.end(),
        }
    }

    pub(crate) fn note_placement(&self, bucket: usize, placed: &Placed) {
        if placed.treeified {
            tracing::trace!(bucket, len = self.buckets[bucket].len(), "bucket converted to tree");
        }
    }
}

impl<T, S, C, P> HashTable<T, S, C, P>
where
    T: Hash,
    S: BuildHasher,
    C: Comparator<T>,
    P: EqPredicate<T>,
{
    #[inline]
    pub(crate) fn make_hash(&self, value: &T) -> u64 {
        self.hasher.hash_one(value)
    }

    #[inline]
    pub(crate) fn index_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    /// Index of the bucket `key` maps to.
    pub fn bucket(&self, key: &T) -> usize {
        let _g = self.guard.enter("bucket");
        self.index_of(self.make_hash(key))
    }

    /// Insert `value`, keeping any equal values already present. Returns a
    /// cursor at the new value.
    pub fn insert_multi(&mut self, value: T) -> Cursor {
        let _g = self.guard.enter("insert_multi");
        let hash = self.make_hash(&value);
        if self.needs_growth(1) {
            self.grow_for_insert();
        }
        let idx = self.index_of(hash);
        let stored = self.config.cache_hash().then_some(hash);
        let node = self.nodes.alloc_for(&self.buckets[idx], value, stored);
        let placed = self.nodes.place_multi(
            &mut self.buckets[idx],
            node,
            &self.comparator,
            &self.predicate,
            self.config.treeify_threshold(),
        );
        self.len += 1;
        self.note_placement(idx, &placed);
        self.cursor_at(idx, placed.node)
    }

    /// Insert `value` unless an equal value is present. Returns a cursor at
    /// the stored value and whether `value` was inserted; a rejected value
    /// is dropped and the table is left unchanged.
    pub fn insert_unique(&mut self, value: T) -> (Cursor, bool) {
        match self.try_insert_unique(value) {
            Ok(pos) => (pos, true),
            Err((pos, _rejected)) => (pos, false),
        }
    }

    /// Like [`insert_unique`](Self::insert_unique) but hands a rejected
    /// value back alongside the cursor at the equal value already stored.
    pub fn try_insert_unique(&mut self, value: T) -> Result<Cursor, (Cursor, T)> {
        let _g = self.guard.enter("insert_unique");
        let hash = self.make_hash(&value);
        if self.needs_growth(1) {
            // A duplicate must not cost a rehash.
            let idx = self.index_of(hash);
            let bucket = &self.buckets[idx];
            if let Some(n) = self.nodes.find(bucket, &value, &self.comparator, &self.predicate) {
                return Err((self.cursor_at(idx, n), value));
            }
            self.grow_for_insert();
        }
        let idx = self.index_of(hash);
        let stored = self.config.cache_hash().then_some(hash);
        let node = self.nodes.alloc_for(&self.buckets[idx], value, stored);
        let placed = self.nodes.place_unique(
            &mut self.buckets[idx],
            node,
            &self.comparator,
            &self.predicate,
            self.config.treeify_threshold(),
        );
        match placed {
            Ok(placed) => {
                self.len += 1;
                self.note_placement(idx, &placed);
                Ok(self.cursor_at(idx, placed.node))
            }
            Err(existing) => {
                let value = self.nodes.free(node);
                Err((self.cursor_at(idx, existing), value))
            }
        }
    }

    /// [`insert_multi`](Self::insert_multi) of a value built by `make`.
    pub fn emplace_multi<F>(&mut self, make: F) -> Cursor
    where
        F: FnOnce() -> T,
    {
        self.insert_multi(make())
    }

    /// [`insert_unique`](Self::insert_unique) of a value built by `make`.
    /// The value is always built, since it is its own key.
    pub fn emplace_unique<F>(&mut self, make: F) -> (Cursor, bool)
    where
        F: FnOnce() -> T,
    {
        self.insert_unique(make())
    }

    /// Insert every value that is not already present.
    pub fn extend_unique<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in iter {
            self.insert_unique(value);
        }
    }

    /// Cursor at the first value equal to `key`, or the end cursor.
    pub fn find(&self, key: &T) -> Cursor {
        let _g = self.guard.enter("find");
        let idx = self.index_of(self.make_hash(key));
        match self.find_in(idx, key) {
            Some(n) => self.cursor_at(idx, n),
            None => self.end(),
        }
    }

    /// True when a value equal to `key` is stored.
    pub fn contains(&self, key: &T) -> bool {
        !self.find(key).is_end()
    }

    /// Number of values equal to `key`.
    pub fn count_multi(&self, key: &T) -> usize {
        let _g = self.guard.enter("count_multi");
        let idx = self.index_of(self.make_hash(key));
        self.nodes
            .count(&self.buckets[idx], key, &self.comparator, &self.predicate)
    }

    /// 1 when a value equal to `key` is present, 0 otherwise.
    pub fn count_unique(&self, key: &T) -> usize {
        usize::from(self.contains(key))
    }

    /// `[first, last)` spanning every value equal to `key`; both are the
    /// end cursor when there is none.
    pub fn equal_range_multi(&self, key: &T) -> (Cursor, Cursor) {
        let _g = self.guard.enter("equal_range_multi");
        let idx = self.index_of(self.make_hash(key));
        let Some(first) = self.find_in(idx, key) else {
            return (self.end(), self.end());
        };
        let bucket = &self.buckets[idx];
        let last = match self
            .nodes
            .past_run(bucket, first, key, &self.comparator, &self.predicate)
        {
            Some(n) => self.cursor_at(idx, n),
            None => self.cursor_from(idx + 1),
        };
        (self.cursor_at(idx, first), last)
    }

    /// `[first, last)` spanning at most one value equal to `key`.
    pub fn equal_range_unique(&self, key: &T) -> (Cursor, Cursor) {
        let _g = self.guard.enter("equal_range_unique");
        let idx = self.index_of(self.make_hash(key));
        match self.find_in(idx, key) {
            Some(n) => (self.cursor_at(idx, n), self.cursor_after(idx, n)),
            None => (self.end(), self.end()),
        }
    }

    /// Remove the value under `pos` and return it. The end cursor and stale
    /// cursors remove nothing.
    ///
    /// Other cursors stay valid unless the erase shrinks a tree bucket
    /// back into a chain, which retires the cursors into that bucket.
    pub fn erase(&mut self, pos: Cursor) -> Option<T> {
        let n = self.resolve(pos)?;
        let _g = self.guard.enter("erase");
        if !self.nodes.unlink(&mut self.buckets[pos.bucket], n) {
            return None;
        }
        self.len -= 1;
        self.shrink_bucket(pos.bucket);
        Some(self.nodes.free(n))
    }

    /// Remove every value in `[first, last)`; returns how many were
    /// removed. `last` must be reachable from `first` by
    /// [`next`](Self::next); otherwise removal runs to the end.
    pub fn erase_range(&mut self, first: Cursor, last: Cursor) -> usize {
        let removed = {
            let _g = self.guard.enter("erase_range");
            let mut removed = Vec::new();
            let mut touched: Vec<usize> = Vec::new();
            let mut pos = first;
            while pos != last {
                let Some(n) = self.resolve(pos) else { break };
                let next = self.cursor_after(pos.bucket, n);
                if self.nodes.unlink(&mut self.buckets[pos.bucket], n) {
                    removed.push(self.nodes.free(n));
                    if touched.last() != Some(&pos.bucket) {
                        touched.push(pos.bucket);
                    }
                }
                pos = next;
            }
            // Shrink only once the walk is over so `next` never dangles.
            for b in touched {
                self.shrink_bucket(b);
            }
            self.len -= removed.len();
            removed
        };
        removed.len()
    }

    /// Remove every value equal to `key`; returns how many were removed.
    pub fn erase_multi(&mut self, key: &T) -> usize {
        let removed = {
            let _g = self.guard.enter("erase_multi");
            let idx = self.index_of(self.make_hash(key));
            let victims =
                self.nodes
                    .matching(&self.buckets[idx], key, &self.comparator, &self.predicate);
            let mut removed = Vec::with_capacity(victims.len());
            for n in victims {
                let unlinked = self.nodes.unlink(&mut self.buckets[idx], n);
                debug_assert!(unlinked, "matching node missing from its bucket");
                removed.push(self.nodes.free(n));
            }
            self.len -= removed.len();
            self.shrink_bucket(idx);
            removed
        };
        removed.len()
    }

    /// Remove one value equal to `key`; returns 1 if one was removed.
    pub fn erase_unique(&mut self, key: &T) -> usize {
        let removed = {
            let _g = self.guard.enter("erase_unique");
            let idx = self.index_of(self.make_hash(key));
            let Some(n) = self.find_in(idx, key) else {
                return 0;
            };
            let unlinked = self.nodes.unlink(&mut self.buckets[idx], n);
            debug_assert!(unlinked, "found node missing from its bucket");
            self.len -= 1;
            self.shrink_bucket(idx);
            self.nodes.free(n)
        };
        drop(removed);
        1
    }

    fn find_in(&self, idx: usize, key: &T) -> Option<NodeRef> {
        self.nodes
            .find(&self.buckets[idx], key, &self.comparator, &self.predicate)
    }

    /// Turn a tree bucket that fell below the untreeify threshold back into
    /// a chain.
    fn shrink_bucket(&mut self, idx: usize) {
        let bucket = &mut self.buckets[idx];
        if !self.config.untreeify_on_erase()
            || bucket.kind() != BucketKind::Tree
            || bucket.len() >= self.config.untreeify_threshold()
        {
            return;
        }
        self.nodes.untreeify(bucket, &self.predicate);
        tracing::trace!(bucket = idx, len = bucket.len(), "bucket converted to chain");
    }

    /// Check every structural invariant; returns a description of the
    /// first violation.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if !self.buckets.len().is_power_of_two() {
            return Err(format!("bucket count {} is not a power of two", self.buckets.len()));
        }
        let mut reachable = 0;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let mut nodes = Vec::new();
            let mut cur = self.nodes.first(bucket);
            while let Some(n) = cur {
                nodes.push(n);
                cur = self.nodes.next_in_bucket(n);
            }
            if nodes.len() != bucket.len() {
                return Err(format!(
                    "bucket {i} records {} nodes but links {}",
                    bucket.len(),
                    nodes.len()
                ));
            }
            for &n in &nodes {
                let hash = self.make_hash(self.nodes.value(n));
                if self.index_of(hash) != i {
                    return Err(format!("value in bucket {i} hashes elsewhere"));
                }
                let expected = self.config.cache_hash().then_some(hash);
                if self.nodes.cached_hash(n) != expected {
                    return Err(format!("bucket {i} holds a wrong cached hash"));
                }
            }
            match *bucket {
                Bucket::Empty => {}
                Bucket::Chain { len, .. } => {
                    if len >= self.config.treeify_threshold() {
                        return Err(format!("chain bucket {i} has {len} nodes"));
                    }
                    // Equal values form one run.
                    for (a, &x) in nodes.iter().enumerate() {
                        let vx = self.nodes.value(x);
                        let last = nodes
                            .iter()
                            .rposition(|&y| self.predicate.equals(self.nodes.value(y), vx))
                            .unwrap_or(a);
                        if nodes[a..=last]
                            .iter()
                            .any(|&y| !self.predicate.equals(self.nodes.value(y), vx))
                        {
                            return Err(format!("equal values split in chain bucket {i}"));
                        }
                    }
                }
                Bucket::Tree { root, len } => {
                    self.nodes
                        .trees
                        .validate(Some(root), &self.comparator)
                        .map_err(|e| format!("tree bucket {i}: {e}"))?;
                    if self.config.untreeify_on_erase() && len < self.config.untreeify_threshold() {
                        return Err(format!("tree bucket {i} shrank to {len} nodes"));
                    }
                }
            }
            reachable += nodes.len();
        }
        if reachable != self.len || self.nodes.len() != self.len {
            return Err(format!(
                "len {} but {reachable} reachable and {} allocated",
                self.len,
                self.nodes.len()
            ));
        }
        Ok(())
    }
}

impl<T, S, C, P> Clone for HashTable<T, S, C, P>
where
    T: Clone,
    S: Clone,
    C: Clone,
    P: Clone,
{
    /// Deep copy. Bucket layout, chain order and tree shapes are kept; the
    /// copy's arenas are compact.
    fn clone(&self) -> Self {
        let _g = self.guard.enter("clone");
        let mut nodes = NodeStore::with_capacity(self.nodes.chains.len(), self.nodes.trees.len());
        let buckets = self
            .buckets
            .iter()
            .map(|b| self.nodes.copy_bucket(b, &mut nodes))
            .collect();
        Self {
            buckets,
            nodes,
            len: self.len,
            id: next_table_id(),
            epoch: 0,
            hasher: self.hasher.clone(),
            comparator: self.comparator.clone(),
            predicate: self.predicate.clone(),
            config: self.config,
            guard: CallbackGuard::new(),
        }
    }
}

impl<T, S, C, P> fmt::Debug for HashTable<T, S, C, P>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T, S, C, P> IntoIterator for &'a HashTable<T, S, C, P> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T, S, C, P> Extend<T> for HashTable<T, S, C, P>
where
    T: Hash,
    S: BuildHasher,
    C: Comparator<T>,
    P: EqPredicate<T>,
{
    /// Inserts with [`insert_multi`](HashTable::insert_multi).
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert_multi(value);
        }
    }
}

impl<T, S, C, P> FromIterator<T> for HashTable<T, S, C, P>
where
    T: Hash,
    S: BuildHasher + Default,
    C: Comparator<T> + Default,
    P: EqPredicate<T> + Default,
{
    /// Collects with multi insertion; use
    /// [`extend_unique`](HashTable::extend_unique) to drop duplicates.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::with_strategies(
            TableConfig::default(),
            S::default(),
            C::default(),
            P::default(),
        );
        table.extend(iter);
        table
    }
}

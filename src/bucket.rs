//! Bucket representation and the chain/tree switch.
//!
//! A bucket is a sum type: empty, a chain head, or a tree root, each with
//! the number of nodes it holds. [`NodeStore`] owns both node arenas and
//! implements everything that works on one bucket at a time: lookup,
//! placement of a new or migrating node, detachment, and the conversions
//! between the two representations. Hashing and bucket selection belong to
//! the table.

use crate::chain::{ChainArena, ChainKey};
use crate::rb_tree::{TreeArena, TreeKey};
use crate::strategy::{Comparator, EqPredicate};
use core::cmp::Ordering;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Bucket {
    #[default]
    Empty,
    Chain {
        head: ChainKey,
        len: usize,
    },
    Tree {
        root: TreeKey,
        len: usize,
    },
}

/// Current representation of a bucket, as reported by
/// [`HashTable::bucket_kind`](crate::HashTable::bucket_kind).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketKind {
    Empty,
    Chain,
    Tree,
}

impl Bucket {
    pub(crate) fn len(&self) -> usize {
        match *self {
            Bucket::Empty => 0,
            Bucket::Chain { len, .. } | Bucket::Tree { len, .. } => len,
        }
    }

    pub(crate) fn kind(&self) -> BucketKind {
        match self {
            Bucket::Empty => BucketKind::Empty,
            Bucket::Chain { .. } => BucketKind::Chain,
            Bucket::Tree { .. } => BucketKind::Tree,
        }
    }
}

/// A node in either arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum NodeRef {
    Chain(ChainKey),
    Tree(TreeKey),
}

/// Outcome of linking a node into a bucket.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placed {
    pub(crate) node: NodeRef,
    pub(crate) treeified: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct NodeStore<T> {
    pub(crate) chains: ChainArena<T>,
    pub(crate) trees: TreeArena<T>,
}

impl<T> NodeStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            chains: ChainArena::new(),
            trees: TreeArena::new(),
        }
    }

    pub(crate) fn with_capacity(chains: usize, trees: usize) -> Self {
        Self {
            chains: ChainArena::with_capacity(chains),
            trees: TreeArena::with_capacity(trees),
        }
    }

    /// Number of live nodes across both arenas.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.chains.len() + self.trees.len()
    }

    pub(crate) fn contains(&self, n: NodeRef) -> bool {
        match n {
            NodeRef::Chain(k) => self.chains.contains(k),
            NodeRef::Tree(k) => self.trees.contains(k),
        }
    }

    #[inline]
    pub(crate) fn value(&self, n: NodeRef) -> &T {
        match n {
            NodeRef::Chain(k) => &self.chains.node(k).value,
            NodeRef::Tree(k) => &self.trees.node(k).value,
        }
    }

    pub(crate) fn cached_hash(&self, n: NodeRef) -> Option<u64> {
        match n {
            NodeRef::Chain(k) => self.chains.node(k).hash,
            NodeRef::Tree(k) => self.trees.node(k).hash,
        }
    }

    /// Allocate a detached node in the arena matching `bucket`.
    pub(crate) fn alloc_for(&mut self, bucket: &Bucket, value: T, hash: Option<u64>) -> NodeRef {
        match bucket {
            Bucket::Tree { .. } => NodeRef::Tree(self.trees.alloc(value, hash)),
            Bucket::Empty | Bucket::Chain { .. } => NodeRef::Chain(self.chains.alloc(value, hash)),
        }
    }

    /// Free a detached node and return its value.
    pub(crate) fn free(&mut self, n: NodeRef) -> T {
        match n {
            NodeRef::Chain(k) => self.chains.free(k).0,
            NodeRef::Tree(k) => self.trees.free(k).0,
        }
    }

    /// First node of the bucket in iteration order.
    pub(crate) fn first(&self, bucket: &Bucket) -> Option<NodeRef> {
        match *bucket {
            Bucket::Empty => None,
            Bucket::Chain { head, .. } => Some(NodeRef::Chain(head)),
            Bucket::Tree { root, .. } => self.trees.min(Some(root)).map(NodeRef::Tree),
        }
    }

    /// Node after `n` within its own bucket.
    pub(crate) fn next_in_bucket(&self, n: NodeRef) -> Option<NodeRef> {
        match n {
            NodeRef::Chain(k) => self.chains.next(k).map(NodeRef::Chain),
            NodeRef::Tree(k) => self.trees.successor(k).map(NodeRef::Tree),
        }
    }

    /// First node equal to `value`: `Pred` on chains, `Comp` on trees.
    pub(crate) fn find<C, P>(
        &self,
        bucket: &Bucket,
        value: &T,
        cmp: &C,
        pred: &P,
    ) -> Option<NodeRef>
    where
        C: Comparator<T>,
        P: EqPredicate<T>,
    {
        match *bucket {
            Bucket::Empty => None,
            Bucket::Chain { head, .. } => self
                .chains
                .find_first_of(Some(head), value, pred)
                .map(NodeRef::Chain),
            Bucket::Tree { root, .. } => self.trees.find(Some(root), value, cmp).map(NodeRef::Tree),
        }
    }

    pub(crate) fn count<C, P>(&self, bucket: &Bucket, value: &T, cmp: &C, pred: &P) -> usize
    where
        C: Comparator<T>,
        P: EqPredicate<T>,
    {
        match *bucket {
            Bucket::Empty => 0,
            Bucket::Chain { head, .. } => self
                .chains
                .keys(Some(head))
                .filter(|&k| pred.equals(&self.chains.node(k).value, value))
                .count(),
            Bucket::Tree { root, .. } => self.trees.count(Some(root), value, cmp),
        }
    }

    /// Every node of the bucket equal to `value`, in iteration order.
    pub(crate) fn matching<C, P>(
        &self,
        bucket: &Bucket,
        value: &T,
        cmp: &C,
        pred: &P,
    ) -> Vec<NodeRef>
    where
        C: Comparator<T>,
        P: EqPredicate<T>,
    {
        match *bucket {
            Bucket::Empty => Vec::new(),
            Bucket::Chain { head, .. } => self
                .chains
                .keys(Some(head))
                .filter(|&k| pred.equals(&self.chains.node(k).value, value))
                .map(NodeRef::Chain)
                .collect(),
            Bucket::Tree { root, .. } => {
                let mut out = Vec::new();
                let mut cur = self.trees.find(Some(root), value, cmp);
                while let Some(k) = cur {
                    if cmp.compare(&self.trees.node(k).value, value) != Ordering::Equal {
                        break;
                    }
                    out.push(NodeRef::Tree(k));
                    cur = self.trees.successor(k);
                }
                out
            }
        }
    }

    /// Node right after the run of values equal to `value` that starts at
    /// `first`, within the bucket. `None` when the run ends the bucket.
    pub(crate) fn past_run<C, P>(
        &self,
        bucket: &Bucket,
        first: NodeRef,
        value: &T,
        cmp: &C,
        pred: &P,
    ) -> Option<NodeRef>
    where
        C: Comparator<T>,
        P: EqPredicate<T>,
    {
        match *bucket {
            Bucket::Tree { root, .. } => self
                .trees
                .upper_bound(Some(root), value, cmp)
                .map(NodeRef::Tree),
            _ => {
                let mut cur = Some(first);
                while let Some(n) = cur {
                    if !pred.equals(self.value(n), value) {
                        break;
                    }
                    cur = self.next_in_bucket(n);
                }
                cur
            }
        }
    }

    /// Link a detached node into `bucket` accepting duplicates, converting
    /// it first if it lives in the other arena. Treeifies the bucket when
    /// its chain reaches `treeify_at`.
    pub(crate) fn place_multi<C, P>(
        &mut self,
        bucket: &mut Bucket,
        node: NodeRef,
        cmp: &C,
        pred: &P,
        treeify_at: usize,
    ) -> Placed
    where
        C: Comparator<T>,
        P: EqPredicate<T>,
    {
        match *bucket {
            Bucket::Tree { root, len } => {
                let t = self.into_tree_node(node);
                let mut root = Some(root);
                self.trees.link_multi(t, &mut root, cmp);
                *bucket = Bucket::Tree {
                    root: root.expect("tree is not empty after linking"),
                    len: len + 1,
                };
                Placed {
                    node: NodeRef::Tree(t),
                    treeified: false,
                }
            }
            Bucket::Empty | Bucket::Chain { .. } => {
                let c = self.into_chain_node(node);
                let (mut head, len) = match *bucket {
                    Bucket::Chain { head, len } => (Some(head), len),
                    _ => (None, 0),
                };
                self.chains.link_multi(c, &mut head, pred);
                *bucket = Bucket::Chain {
                    head: head.expect("chain is not empty after linking"),
                    len: len + 1,
                };
                self.after_chain_growth(bucket, c, cmp, treeify_at)
            }
        }
    }

    /// Link a detached node unless the bucket already holds an equal value.
    /// On rejection the node is left detached and the existing node is
    /// returned.
    pub(crate) fn place_unique<C, P>(
        &mut self,
        bucket: &mut Bucket,
        node: NodeRef,
        cmp: &C,
        pred: &P,
        treeify_at: usize,
    ) -> Result<Placed, NodeRef>
    where
        C: Comparator<T>,
        P: EqPredicate<T>,
    {
        match (*bucket, node) {
            (Bucket::Tree { root, len }, NodeRef::Tree(t)) => {
                let mut root = Some(root);
                self.trees
                    .link_unique(t, &mut root, cmp)
                    .map_err(NodeRef::Tree)?;
                *bucket = Bucket::Tree {
                    root: root.expect("tree is not empty after linking"),
                    len: len + 1,
                };
                Ok(Placed {
                    node,
                    treeified: false,
                })
            }
            (Bucket::Empty, NodeRef::Chain(c)) => {
                *bucket = Bucket::Chain { head: c, len: 1 };
                Ok(self.after_chain_growth(bucket, c, cmp, treeify_at))
            }
            (Bucket::Chain { head, len }, NodeRef::Chain(c)) => {
                let mut head = Some(head);
                self.chains
                    .link_unique(c, &mut head, pred)
                    .map_err(NodeRef::Chain)?;
                *bucket = Bucket::Chain {
                    head: head.expect("chain is not empty after linking"),
                    len: len + 1,
                };
                Ok(self.after_chain_growth(bucket, c, cmp, treeify_at))
            }
            _ => unreachable!("node allocated in the arena of another representation"),
        }
    }

    fn after_chain_growth<C>(
        &mut self,
        bucket: &mut Bucket,
        c: ChainKey,
        cmp: &C,
        treeify_at: usize,
    ) -> Placed
    where
        C: Comparator<T>,
    {
        if bucket.len() >= treeify_at {
            let t = self.treeify(bucket, cmp, Some(c));
            Placed {
                node: NodeRef::Tree(t.expect("tracked node survives treeify")),
                treeified: true,
            }
        } else {
            Placed {
                node: NodeRef::Chain(c),
                treeified: false,
            }
        }
    }

    /// Detach `n` from `bucket`. Returns false, leaving everything as it
    /// was, when `n` is not a node of this bucket.
    pub(crate) fn unlink(&mut self, bucket: &mut Bucket, n: NodeRef) -> bool {
        match (*bucket, n) {
            (Bucket::Chain { head, len }, NodeRef::Chain(c)) => {
                let mut head = Some(head);
                if !self.chains.unlink(&mut head, c) {
                    return false;
                }
                *bucket = match head {
                    Some(head) => Bucket::Chain { head, len: len - 1 },
                    None => Bucket::Empty,
                };
                true
            }
            (Bucket::Tree { root, len }, NodeRef::Tree(t)) => {
                if self.trees.root_of(t) != root {
                    return false;
                }
                let mut root = Some(root);
                self.trees.unlink(t, &mut root);
                *bucket = match root {
                    Some(root) => Bucket::Tree { root, len: len - 1 },
                    None => Bucket::Empty,
                };
                true
            }
            _ => false,
        }
    }

    /// Convert a chain bucket to a tree, multi-inserting its nodes in chain
    /// order so equal values keep their relative order. No-op on other
    /// buckets. Returns the new key of `track` when it was on the chain.
    pub(crate) fn treeify<C>(
        &mut self,
        bucket: &mut Bucket,
        cmp: &C,
        track: Option<ChainKey>,
    ) -> Option<TreeKey>
    where
        C: Comparator<T>,
    {
        let Bucket::Chain { head, len } = *bucket else {
            return None;
        };
        let mut head = Some(head);
        let mut root = None;
        let mut tracked = None;
        while let Some(c) = self.chains.pop_front(&mut head) {
            let (value, hash) = self.chains.free(c);
            let t = self.trees.alloc(value, hash);
            self.trees.link_multi(t, &mut root, cmp);
            if track == Some(c) {
                tracked = Some(t);
            }
        }
        *bucket = Bucket::Tree {
            root: root.expect("a chain bucket is never empty"),
            len,
        };
        tracked
    }

    /// Convert a tree bucket back to a chain. Nodes are detached in
    /// post-order and linked next to an equal value when the chain already
    /// has one, at the head otherwise. No-op on other buckets.
    pub(crate) fn untreeify<P>(&mut self, bucket: &mut Bucket, pred: &P)
    where
        P: EqPredicate<T>,
    {
        let Bucket::Tree { root, len } = *bucket else {
            return;
        };
        let mut at = Some(root);
        let mut head = None;
        while let Some(t) = self.trees.take_leaf(&mut at) {
            let (value, hash) = self.trees.free(t);
            let c = self.chains.alloc(value, hash);
            self.chains.link_multi(c, &mut head, pred);
        }
        *bucket = Bucket::Chain {
            head: head.expect("a tree bucket is never empty"),
            len,
        };
    }

    /// Free every node of the bucket and leave it empty.
    pub(crate) fn destroy(&mut self, bucket: &mut Bucket) {
        match *bucket {
            Bucket::Empty => {}
            Bucket::Chain { head, .. } => self.chains.destroy(Some(head)),
            Bucket::Tree { root, .. } => self.trees.destroy(Some(root)),
        }
        *bucket = Bucket::Empty;
    }

    /// Deep copy of one bucket into `dst`, keeping order and tree shape.
    pub(crate) fn copy_bucket(&self, bucket: &Bucket, dst: &mut NodeStore<T>) -> Bucket
    where
        T: Clone,
    {
        match *bucket {
            Bucket::Empty => Bucket::Empty,
            Bucket::Chain { head, len } => Bucket::Chain {
                head: self
                    .chains
                    .copy_into(Some(head), &mut dst.chains)
                    .expect("copy of a non-empty chain"),
                len,
            },
            Bucket::Tree { root, len } => Bucket::Tree {
                root: self
                    .trees
                    .copy_into(Some(root), &mut dst.trees)
                    .expect("copy of a non-empty tree"),
                len,
            },
        }
    }

    fn into_tree_node(&mut self, n: NodeRef) -> TreeKey {
        match n {
            NodeRef::Tree(t) => t,
            NodeRef::Chain(c) => {
                let (value, hash) = self.chains.free(c);
                self.trees.alloc(value, hash)
            }
        }
    }

    fn into_chain_node(&mut self, n: NodeRef) -> ChainKey {
        match n {
            NodeRef::Chain(c) => c,
            NodeRef::Tree(t) => {
                let (value, hash) = self.trees.free(t);
                self.chains.alloc(value, hash)
            }
        }
    }
}

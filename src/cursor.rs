//! Positions and iteration.
//!
//! A [`Cursor`] names one node of one table: its bucket index, the node's
//! arena key, the identity of the issuing table and that table's rehash
//! epoch at the time it was produced. It borrows nothing, so it can be held
//! across mutations; the table checks it on every use. Keys are
//! generational, so a cursor whose node was erased (or converted by
//! treeify/untreeify) resolves to nothing instead of a newer node in the
//! same slot. Any rehash retires every cursor taken before it, and another
//! table (a clone included) never honors it.

use crate::bucket::{Bucket, NodeRef, NodeStore};
use core::fmt;
use core::iter::FusedIterator;

#[derive(Clone, Copy)]
pub struct Cursor {
    pub(crate) bucket: usize,
    pub(crate) node: Option<NodeRef>,
    pub(crate) owner: u64,
    pub(crate) epoch: u64,
}

impl Cursor {
    pub(crate) fn at(bucket: usize, node: NodeRef, owner: u64, epoch: u64) -> Self {
        Self {
            bucket,
            node: Some(node),
            owner,
            epoch,
        }
    }

    pub(crate) fn end(bucket_count: usize, owner: u64, epoch: u64) -> Self {
        Self {
            bucket: bucket_count,
            node: None,
            owner,
            epoch,
        }
    }

    /// True for the past-the-end position.
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Index of the bucket this cursor points into; the bucket count for
    /// the end position.
    pub fn bucket_index(&self) -> usize {
        self.bucket
    }
}

/// Cursors are equal when they name the same node of the same table. All
/// end positions are equal.
impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && (self.node.is_none() || self.owner == other.owner)
    }
}

impl Eq for Cursor {}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            None => f.write_str("Cursor(end)"),
            Some(_) => f
                .debug_struct("Cursor")
                .field("bucket", &self.bucket)
                .field("epoch", &self.epoch)
                .finish_non_exhaustive(),
        }
    }
}

/// First node at or after bucket `from`.
pub(crate) fn first_from<T>(
    buckets: &[Bucket],
    nodes: &NodeStore<T>,
    from: usize,
) -> Option<(usize, NodeRef)> {
    buckets
        .iter()
        .enumerate()
        .skip(from)
        .find_map(|(i, b)| nodes.first(b).map(|n| (i, n)))
}

/// Position after `(bucket, node)`: the next node of the same bucket, or the
/// first node of the next non-empty bucket.
pub(crate) fn step<T>(
    buckets: &[Bucket],
    nodes: &NodeStore<T>,
    bucket: usize,
    node: NodeRef,
) -> Option<(usize, NodeRef)> {
    match nodes.next_in_bucket(node) {
        Some(n) => Some((bucket, n)),
        None => first_from(buckets, nodes, bucket + 1),
    }
}

/// Borrowing iterator over the values of a table, bucket by bucket.
///
/// Within a chain bucket values come in chain order, within a tree bucket
/// in comparator order.
pub struct Iter<'a, T> {
    buckets: &'a [Bucket],
    nodes: &'a NodeStore<T>,
    at: Option<(usize, NodeRef)>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(buckets: &'a [Bucket], nodes: &'a NodeStore<T>, len: usize) -> Self {
        Self {
            buckets,
            nodes,
            at: first_from(buckets, nodes, 0),
            remaining: len,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let (bucket, node) = self.at?;
        self.at = step(self.buckets, self.nodes, bucket, node);
        self.remaining -= 1;
        Some(self.nodes.value(node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

/// Iterator over the values of a single bucket.
pub struct BucketIter<'a, T> {
    nodes: &'a NodeStore<T>,
    at: Option<NodeRef>,
    remaining: usize,
}

impl<'a, T> BucketIter<'a, T> {
    pub(crate) fn new(bucket: &Bucket, nodes: &'a NodeStore<T>) -> Self {
        Self {
            nodes,
            at: nodes.first(bucket),
            remaining: bucket.len(),
        }
    }
}

impl<'a, T> Iterator for BucketIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.at?;
        self.at = self.nodes.next_in_bucket(node);
        self.remaining -= 1;
        Some(self.nodes.value(node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for BucketIter<'_, T> {}

impl<T> FusedIterator for BucketIter<'_, T> {}

//! Singly linked chain primitives over a slot arena.
//!
//! A chain is addressed by the key of its head node; `None` is the empty
//! chain. Every node is exclusively owned by the chain that reaches it, and
//! the arena only provides storage. None of these operations hash or order
//! values; `find_first_of` is the only one that calls into user code.

use crate::strategy::EqPredicate;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generational key of a chain node.
    pub struct ChainKey;
}

#[derive(Debug, Clone)]
pub(crate) struct ChainNode<T> {
    pub(crate) next: Option<ChainKey>,
    pub(crate) value: T,
    pub(crate) hash: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct ChainArena<T> {
    slots: SlotMap<ChainKey, ChainNode<T>>,
}

impl<T> ChainArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(n),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Allocate a detached node.
    pub(crate) fn alloc(&mut self, value: T, hash: Option<u64>) -> ChainKey {
        self.slots.insert(ChainNode {
            next: None,
            value,
            hash,
        })
    }

    /// Free a node that is no longer linked; returns its payload.
    pub(crate) fn free(&mut self, k: ChainKey) -> (T, Option<u64>) {
        let node = self
            .slots
            .remove(k)
            .expect("chain node freed twice or never allocated");
        debug_assert!(node.next.is_none(), "freeing a node that is still linked");
        (node.value, node.hash)
    }

    pub(crate) fn contains(&self, k: ChainKey) -> bool {
        self.slots.contains_key(k)
    }

    #[inline]
    pub(crate) fn node(&self, k: ChainKey) -> &ChainNode<T> {
        &self.slots[k]
    }

    #[inline]
    pub(crate) fn next(&self, k: ChainKey) -> Option<ChainKey> {
        self.slots[k].next
    }

    /// Link `node` right after `*target`, or make it `*target` when the
    /// slot is empty.
    pub(crate) fn link_after(&mut self, node: ChainKey, target: &mut Option<ChainKey>) {
        match *target {
            None => *target = Some(node),
            Some(t) => {
                let after = self.slots[t].next;
                self.slots[node].next = after;
                self.slots[t].next = Some(node);
            }
        }
    }

    /// Make `node` the new head of the chain.
    pub(crate) fn push_front(&mut self, node: ChainKey, head: &mut Option<ChainKey>) {
        self.slots[node].next = *head;
        *head = Some(node);
    }

    /// Detach and return the node following `node`.
    pub(crate) fn unlink_after(&mut self, node: ChainKey) -> Option<ChainKey> {
        let victim = self.slots[node].next?;
        let after = self.slots[victim].next.take();
        self.slots[node].next = after;
        Some(victim)
    }

    /// Detach and return the head node.
    pub(crate) fn pop_front(&mut self, head: &mut Option<ChainKey>) -> Option<ChainKey> {
        let h = (*head)?;
        *head = self.slots[h].next.take();
        Some(h)
    }

    /// First node whose value matches `value` under `pred`.
    pub(crate) fn find_first_of<P>(
        &self,
        head: Option<ChainKey>,
        value: &T,
        pred: &P,
    ) -> Option<ChainKey>
    where
        P: EqPredicate<T>,
    {
        self.keys(head).find(|&k| pred.equals(&self.slots[k].value, value))
    }

    /// Link a detached node next to the first equal value, or at the head
    /// when there is none. Equal values stay contiguous.
    pub(crate) fn link_multi<P>(&mut self, node: ChainKey, head: &mut Option<ChainKey>, pred: &P)
    where
        P: EqPredicate<T>,
    {
        match self.find_first_of(*head, &self.slots[node].value, pred) {
            Some(equal) => self.link_after(node, &mut Some(equal)),
            None => self.push_front(node, head),
        }
    }

    /// Link a detached node at the head unless the chain already holds an
    /// equal value, which is returned instead.
    pub(crate) fn link_unique<P>(
        &mut self,
        node: ChainKey,
        head: &mut Option<ChainKey>,
        pred: &P,
    ) -> Result<(), ChainKey>
    where
        P: EqPredicate<T>,
    {
        if let Some(equal) = self.find_first_of(*head, &self.slots[node].value, pred) {
            return Err(equal);
        }
        self.push_front(node, head);
        Ok(())
    }

    /// Node whose `next` is `node`, or `None` when `node` is the head.
    /// The outer `None` means `node` is not on this chain.
    pub(crate) fn predecessor_of(
        &self,
        head: Option<ChainKey>,
        node: ChainKey,
    ) -> Option<Option<ChainKey>> {
        let mut prev = None;
        for k in self.keys(head) {
            if k == node {
                return Some(prev);
            }
            prev = Some(k);
        }
        None
    }

    /// Detach `node` from the chain rooted at `*head`. Returns false when
    /// the node is not on that chain.
    pub(crate) fn unlink(&mut self, head: &mut Option<ChainKey>, node: ChainKey) -> bool {
        match self.predecessor_of(*head, node) {
            Some(None) => {
                self.pop_front(head);
                true
            }
            Some(Some(prev)) => {
                self.unlink_after(prev);
                true
            }
            None => false,
        }
    }

    pub(crate) fn keys(&self, head: Option<ChainKey>) -> ChainKeys<'_, T> {
        ChainKeys { arena: self, at: head }
    }

    /// Free every node of the chain, front to back.
    pub(crate) fn destroy(&mut self, head: Option<ChainKey>) {
        let mut head = head;
        while let Some(k) = self.pop_front(&mut head) {
            drop(self.free(k));
        }
    }

    /// Copy the chain into `dst`, preserving order; returns the new head.
    pub(crate) fn copy_into(
        &self,
        head: Option<ChainKey>,
        dst: &mut ChainArena<T>,
    ) -> Option<ChainKey>
    where
        T: Clone,
    {
        let mut new_head = None;
        let mut tail: Option<ChainKey> = None;
        for k in self.keys(head) {
            let src = &self.slots[k];
            let n = dst.alloc(src.value.clone(), src.hash);
            match tail {
                None => new_head = Some(n),
                Some(t) => dst.link_after(n, &mut Some(t)),
            }
            tail = Some(n);
        }
        new_head
    }
}

/// Walks the keys of one chain.
pub(crate) struct ChainKeys<'a, T> {
    arena: &'a ChainArena<T>,
    at: Option<ChainKey>,
}

impl<'a, T> Iterator for ChainKeys<'a, T> {
    type Item = ChainKey;
    #[inline]
    fn next(&mut self) -> Option<ChainKey> {
        let k = self.at?;
        self.at = self.arena.next(k);
        Some(k)
    }
}

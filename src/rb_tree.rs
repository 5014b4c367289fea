//! Red-black tree primitives over a slot arena.
//!
//! A tree is addressed by the key of its root (`None` is the empty tree).
//! Parent links are back-references used for traversal and rotations only;
//! ownership follows the child links. Every function that may move the root
//! takes `root: &mut Option<TreeKey>` and keeps it current.
//!
//! Invariants maintained by `link_*` and `unlink`:
//! - the root is black;
//! - a red node has no red child;
//! - every root-to-leaf path crosses the same number of black nodes
//!   (absent children count as black).
//!
//! Ordering is supplied per call through a [`Comparator`]. Equal values are
//! allowed by `link_multi`, which places a new node after every node that
//! compares equal to it.

use crate::strategy::Comparator;
use core::cmp::Ordering;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generational key of a tree node.
    pub struct TreeKey;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
pub(crate) struct TreeNode<T> {
    pub(crate) value: T,
    pub(crate) hash: Option<u64>,
    left: Option<TreeKey>,
    right: Option<TreeKey>,
    parent: Option<TreeKey>,
    color: Color,
}

#[derive(Debug, Clone)]
pub(crate) struct TreeArena<T> {
    slots: SlotMap<TreeKey, TreeNode<T>>,
}

impl<T> TreeArena<T> {
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

    /// Allocate a detached red node.
    pub(crate) fn alloc(&mut self, value: T, hash: Option<u64>) -> TreeKey {
        self.slots.insert(TreeNode {
            value,
            hash,
            left: None,
            right: None,
            parent: None,
            color: Color::Red,
        })
    }

    /// Free a detached node; returns its payload.
    pub(crate) fn free(&mut self, k: TreeKey) -> (T, Option<u64>) {
        let node = self
            .slots
            .remove(k)
            .expect("tree node freed twice or never allocated");
        debug_assert!(
            node.left.is_none() && node.right.is_none() && node.parent.is_none(),
            "freeing a node that is still linked"
        );
        (node.value, node.hash)
    }

    pub(crate) fn contains(&self, k: TreeKey) -> bool {
        self.slots.contains_key(k)
    }

    #[inline]
    pub(crate) fn node(&self, k: TreeKey) -> &TreeNode<T> {
        &self.slots[k]
    }

    #[inline]
    pub(crate) fn left(&self, k: TreeKey) -> Option<TreeKey> {
        self.slots[k].left
    }

    #[inline]
    pub(crate) fn right(&self, k: TreeKey) -> Option<TreeKey> {
        self.slots[k].right
    }

    #[inline]
    pub(crate) fn parent(&self, k: TreeKey) -> Option<TreeKey> {
        self.slots[k].parent
    }

    #[inline]
    fn color_of(&self, k: Option<TreeKey>) -> Color {
        k.map_or(Color::Black, |k| self.slots[k].color)
    }

    #[inline]
    fn set_color(&mut self, k: TreeKey, color: Color) {
        self.slots[k].color = color;
    }

    /// Root of the tree containing `k`.
    pub(crate) fn root_of(&self, mut k: TreeKey) -> TreeKey {
        while let Some(p) = self.parent(k) {
            k = p;
        }
        k
    }

    pub(crate) fn min(&self, root: Option<TreeKey>) -> Option<TreeKey> {
        let mut k = root?;
        while let Some(l) = self.left(k) {
            k = l;
        }
        Some(k)
    }

    /// In-order successor, or `None` past the maximum.
    pub(crate) fn successor(&self, k: TreeKey) -> Option<TreeKey> {
        if let Some(r) = self.right(k) {
            return self.min(Some(r));
        }
        let mut child = k;
        let mut up = self.parent(k);
        while let Some(p) = up {
            if self.right(p) != Some(child) {
                break;
            }
            child = p;
            up = self.parent(p);
        }
        up
    }

    #[cfg(test)]
    pub(crate) fn max(&self, root: Option<TreeKey>) -> Option<TreeKey> {
        let mut k = root?;
        while let Some(r) = self.right(k) {
            k = r;
        }
        Some(k)
    }

    /// In-order predecessor, or `None` before the minimum.
    #[cfg(test)]
    pub(crate) fn predecessor(&self, k: TreeKey) -> Option<TreeKey> {
        if let Some(l) = self.left(k) {
            return self.max(Some(l));
        }
        let mut child = k;
        let mut up = self.parent(k);
        while let Some(p) = up {
            if self.left(p) != Some(child) {
                break;
            }
            child = p;
            up = self.parent(p);
        }
        up
    }

    /// Point `parent`'s link that referenced `old` at `new` instead.
    fn replace_child(
        &mut self,
        parent: Option<TreeKey>,
        old: TreeKey,
        new: Option<TreeKey>,
        root: &mut Option<TreeKey>,
    ) {
        match parent {
            None => *root = new,
            Some(p) => {
                let pn = &mut self.slots[p];
                if pn.left == Some(old) {
                    pn.left = new;
                } else {
                    debug_assert_eq!(pn.right, Some(old));
                    pn.right = new;
                }
            }
        }
    }

    //      p                p
    //      |                |
    //      x                y
    //     / \      ->      / \
    //    a   y            x   c
    //       / \          / \
    //      b   c        a   b
    pub(crate) fn rotate_left(&mut self, x: TreeKey, root: &mut Option<TreeKey>) {
        let y = self.right(x).expect("rotate_left needs a right child");
        let b = self.left(y);
        self.slots[x].right = b;
        if let Some(b) = b {
            self.slots[b].parent = Some(x);
        }
        let p = self.parent(x);
        self.slots[y].parent = p;
        self.replace_child(p, x, Some(y), root);
        self.slots[y].left = Some(x);
        self.slots[x].parent = Some(y);
    }

    // Mirror image of `rotate_left`.
    pub(crate) fn rotate_right(&mut self, x: TreeKey, root: &mut Option<TreeKey>) {
        let y = self.left(x).expect("rotate_right needs a left child");
        let b = self.right(y);
        self.slots[x].left = b;
        if let Some(b) = b {
            self.slots[b].parent = Some(x);
        }
        let p = self.parent(x);
        self.slots[y].parent = p;
        self.replace_child(p, x, Some(y), root);
        self.slots[y].right = Some(x);
        self.slots[x].parent = Some(y);
    }

    fn attach(
        &mut self,
        node: TreeKey,
        parent: Option<TreeKey>,
        as_left: bool,
        root: &mut Option<TreeKey>,
    ) {
        {
            let n = &mut self.slots[node];
            n.left = None;
            n.right = None;
            n.parent = parent;
            n.color = Color::Red;
        }
        match parent {
            None => *root = Some(node),
            Some(p) if as_left => self.slots[p].left = Some(node),
            Some(p) => self.slots[p].right = Some(node),
        }
        self.insert_fixup(node, root);
    }

    /// Link a detached node, accepting duplicates.
    pub(crate) fn link_multi<C>(&mut self, node: TreeKey, root: &mut Option<TreeKey>, cmp: &C)
    where
        C: Comparator<T>,
    {
        let mut parent = None;
        let mut as_left = false;
        let mut cur = *root;
        while let Some(c) = cur {
            parent = Some(c);
            as_left =
                cmp.compare(&self.slots[node].value, &self.slots[c].value) == Ordering::Less;
            cur = if as_left { self.left(c) } else { self.right(c) };
        }
        self.attach(node, parent, as_left, root);
    }

    /// Link a detached node unless an equal one is present, in which case
    /// the tree is untouched and the existing node is returned.
    pub(crate) fn link_unique<C>(
        &mut self,
        node: TreeKey,
        root: &mut Option<TreeKey>,
        cmp: &C,
    ) -> Result<(), TreeKey>
    where
        C: Comparator<T>,
    {
        let mut parent = None;
        let mut as_left = false;
        let mut cur = *root;
        while let Some(c) = cur {
            parent = Some(c);
            match cmp.compare(&self.slots[node].value, &self.slots[c].value) {
                Ordering::Less => {
                    as_left = true;
                    cur = self.left(c);
                }
                Ordering::Greater => {
                    as_left = false;
                    cur = self.right(c);
                }
                Ordering::Equal => return Err(c),
            }
        }
        self.attach(node, parent, as_left, root);
        Ok(())
    }

    fn insert_fixup(&mut self, node: TreeKey, root: &mut Option<TreeKey>) {
        let mut z = node;
        while let Some(p) = self.parent(z) {
            if self.slots[p].color == Color::Black {
                break;
            }
            let g = self.parent(p).expect("a red node is never the root");
            if self.left(g) == Some(p) {
                let uncle = self.right(g);
                if let Some(u) = uncle.filter(|&u| self.slots[u].color == Color::Red) {
                    self.set_color(p, Color::Black);
                    self.set_color(u, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if self.right(p) == Some(z) {
                        z = p;
                        self.rotate_left(z, root);
                    }
                    let p = self.parent(z).expect("rotated node keeps a parent");
                    let g = self.parent(p).expect("rotated node keeps a grandparent");
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_right(g, root);
                }
            } else {
                let uncle = self.left(g);
                if let Some(u) = uncle.filter(|&u| self.slots[u].color == Color::Red) {
                    self.set_color(p, Color::Black);
                    self.set_color(u, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if self.left(p) == Some(z) {
                        z = p;
                        self.rotate_right(z, root);
                    }
                    let p = self.parent(z).expect("rotated node keeps a parent");
                    let g = self.parent(p).expect("rotated node keeps a grandparent");
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_left(g, root);
                }
            }
        }
        if let Some(r) = *root {
            self.set_color(r, Color::Black);
        }
    }

    /// Detach `z` from the tree, rebalancing as needed. The node stays
    /// allocated with all links cleared. Node identities are preserved: when
    /// `z` has two children its in-order successor is moved into its place
    /// rather than having values swapped.
    pub(crate) fn unlink(&mut self, z: TreeKey, root: &mut Option<TreeKey>) {
        let x;
        let x_parent;
        let removed;
        match (self.left(z), self.right(z)) {
            (Some(zl), Some(zr)) => {
                let y = self.min(Some(zr)).expect("right subtree is not empty");
                removed = self.slots[y].color;
                x = self.right(y);

                self.slots[y].left = Some(zl);
                self.slots[zl].parent = Some(y);
                if y == zr {
                    x_parent = Some(y);
                } else {
                    let yp = self.parent(y).expect("successor below z has a parent");
                    x_parent = Some(yp);
                    if let Some(xk) = x {
                        self.slots[xk].parent = Some(yp);
                    }
                    self.slots[yp].left = x;
                    self.slots[y].right = Some(zr);
                    self.slots[zr].parent = Some(y);
                }
                let zp = self.parent(z);
                self.replace_child(zp, z, Some(y), root);
                self.slots[y].parent = zp;
                self.slots[y].color = self.slots[z].color;
            }
            (child, None) | (None, child) => {
                removed = self.slots[z].color;
                x = child;
                x_parent = self.parent(z);
                if let Some(c) = child {
                    self.slots[c].parent = x_parent;
                }
                self.replace_child(x_parent, z, child, root);
            }
        }

        {
            let zn = &mut self.slots[z];
            zn.left = None;
            zn.right = None;
            zn.parent = None;
            zn.color = Color::Red;
        }

        if removed == Color::Black {
            self.erase_fixup(x, x_parent, root);
        }
    }

    fn erase_fixup(
        &mut self,
        x: Option<TreeKey>,
        x_parent: Option<TreeKey>,
        root: &mut Option<TreeKey>,
    ) {
        let mut x = x;
        let mut xp = x_parent;
        while x != *root && self.color_of(x) == Color::Black {
            let Some(p) = xp else { break };
            if self.left(p) == x {
                let mut w = self.right(p).expect("doubly black node has a sibling");
                if self.slots[w].color == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_left(p, root);
                    w = self.right(p).expect("doubly black node has a sibling");
                }
                if self.color_of(self.left(w)) == Color::Black
                    && self.color_of(self.right(w)) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    xp = self.parent(p);
                } else {
                    if self.color_of(self.right(w)) == Color::Black {
                        if let Some(wl) = self.left(w) {
                            self.set_color(wl, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_right(w, root);
                        w = self.right(p).expect("doubly black node has a sibling");
                    }
                    let pc = self.slots[p].color;
                    self.set_color(w, pc);
                    self.set_color(p, Color::Black);
                    if let Some(wr) = self.right(w) {
                        self.set_color(wr, Color::Black);
                    }
                    self.rotate_left(p, root);
                    x = *root;
                    break;
                }
            } else {
                let mut w = self.left(p).expect("doubly black node has a sibling");
                if self.slots[w].color == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_right(p, root);
                    w = self.left(p).expect("doubly black node has a sibling");
                }
                if self.color_of(self.left(w)) == Color::Black
                    && self.color_of(self.right(w)) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    xp = self.parent(p);
                } else {
                    if self.color_of(self.left(w)) == Color::Black {
                        if let Some(wr) = self.right(w) {
                            self.set_color(wr, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_left(w, root);
                        w = self.left(p).expect("doubly black node has a sibling");
                    }
                    let pc = self.slots[p].color;
                    self.set_color(w, pc);
                    self.set_color(p, Color::Black);
                    if let Some(wl) = self.left(w) {
                        self.set_color(wl, Color::Black);
                    }
                    self.rotate_right(p, root);
                    x = *root;
                    break;
                }
            }
        }
        if let Some(xk) = x {
            self.set_color(xk, Color::Black);
        }
    }

    /// First node not ordered before `value`.
    pub(crate) fn lower_bound<C>(
        &self,
        root: Option<TreeKey>,
        value: &T,
        cmp: &C,
    ) -> Option<TreeKey>
    where
        C: Comparator<T>,
    {
        let mut cur = root;
        let mut found = None;
        while let Some(c) = cur {
            if cmp.compare(&self.slots[c].value, value) == Ordering::Less {
                cur = self.right(c);
            } else {
                found = Some(c);
                cur = self.left(c);
            }
        }
        found
    }

    /// First node ordered after `value`.
    pub(crate) fn upper_bound<C>(
        &self,
        root: Option<TreeKey>,
        value: &T,
        cmp: &C,
    ) -> Option<TreeKey>
    where
        C: Comparator<T>,
    {
        let mut cur = root;
        let mut found = None;
        while let Some(c) = cur {
            if cmp.compare(value, &self.slots[c].value) == Ordering::Less {
                found = Some(c);
                cur = self.left(c);
            } else {
                cur = self.right(c);
            }
        }
        found
    }

    /// First node equal to `value`.
    pub(crate) fn find<C>(&self, root: Option<TreeKey>, value: &T, cmp: &C) -> Option<TreeKey>
    where
        C: Comparator<T>,
    {
        self.lower_bound(root, value, cmp)
            .filter(|&k| cmp.compare(&self.slots[k].value, value) == Ordering::Equal)
    }

    /// Number of nodes equal to `value`.
    pub(crate) fn count<C>(&self, root: Option<TreeKey>, value: &T, cmp: &C) -> usize
    where
        C: Comparator<T>,
    {
        let mut n = 0;
        let mut cur = self.find(root, value, cmp);
        while let Some(k) = cur {
            if cmp.compare(&self.slots[k].value, value) != Ordering::Equal {
                break;
            }
            n += 1;
            cur = self.successor(k);
        }
        n
    }

    /// Detach and return the next node in post-order, starting from `*at`.
    ///
    /// Descends from `*at` to a leaf, cuts that leaf from its parent and
    /// leaves `*at` on the parent, so repeated calls visit children before
    /// their parent and never follow a link into a node already taken.
    /// Colors are left as they were; the caller owns the returned node.
    pub(crate) fn take_leaf(&mut self, at: &mut Option<TreeKey>) -> Option<TreeKey> {
        let mut k = (*at)?;
        loop {
            if let Some(l) = self.left(k) {
                k = l;
            } else if let Some(r) = self.right(k) {
                k = r;
            } else {
                break;
            }
        }
        let parent = self.slots[k].parent.take();
        if let Some(p) = parent {
            let pn = &mut self.slots[p];
            if pn.left == Some(k) {
                pn.left = None;
            } else {
                pn.right = None;
            }
        }
        *at = parent;
        Some(k)
    }

    /// Free every node of the tree.
    pub(crate) fn destroy(&mut self, root: Option<TreeKey>) {
        let mut at = root;
        while let Some(k) = self.take_leaf(&mut at) {
            drop(self.free(k));
        }
    }

    #[cfg(test)]
    pub(crate) fn keys(&self, root: Option<TreeKey>) -> InOrder<'_, T> {
        InOrder {
            arena: self,
            at: self.min(root),
        }
    }

    /// Copy the tree into `dst` with identical shape and colors; returns
    /// the new root.
    pub(crate) fn copy_into(&self, root: Option<TreeKey>, dst: &mut TreeArena<T>) -> Option<TreeKey>
    where
        T: Clone,
    {
        root.map(|r| self.copy_subtree(r, None, dst))
    }

    fn copy_subtree(&self, k: TreeKey, parent: Option<TreeKey>, dst: &mut TreeArena<T>) -> TreeKey
    where
        T: Clone,
    {
        let src = &self.slots[k];
        let n = dst.slots.insert(TreeNode {
            value: src.value.clone(),
            hash: src.hash,
            left: None,
            right: None,
            parent,
            color: src.color,
        });
        if let Some(l) = src.left {
            let c = self.copy_subtree(l, Some(n), dst);
            dst.slots[n].left = Some(c);
        }
        if let Some(r) = src.right {
            let c = self.copy_subtree(r, Some(n), dst);
            dst.slots[n].right = Some(c);
        }
        n
    }

    /// Check the red-black and ordering invariants; returns the black height.
    #[cfg(test)]
    pub(crate) fn validate<C>(&self, root: Option<TreeKey>, cmp: &C) -> Result<usize, String>
    where
        C: Comparator<T>,
    {
        let Some(r) = root else { return Ok(1) };
        if self.slots[r].parent.is_some() {
            return Err("root has a parent".into());
        }
        if self.slots[r].color != Color::Black {
            return Err("root is red".into());
        }
        let mut prev: Option<TreeKey> = None;
        for k in self.keys(root) {
            if let Some(p) = prev {
                if cmp.compare(&self.slots[p].value, &self.slots[k].value) == Ordering::Greater {
                    return Err("in-order walk is not sorted".into());
                }
                if self.predecessor(k) != Some(p) {
                    return Err("predecessor disagrees with successor".into());
                }
            }
            prev = Some(k);
        }
        if prev != self.max(root) {
            return Err("in-order walk does not end at the maximum".into());
        }
        self.black_height(r)
    }

    #[cfg(test)]
    fn black_height(&self, k: TreeKey) -> Result<usize, String> {
        let n = &self.slots[k];
        for child in [n.left, n.right].into_iter().flatten() {
            if self.slots[child].parent != Some(k) {
                return Err("child does not point back at its parent".into());
            }
            if n.color == Color::Red && self.slots[child].color == Color::Red {
                return Err("red node has a red child".into());
            }
        }
        let lh = n.left.map_or(Ok(1), |l| self.black_height(l))?;
        let rh = n.right.map_or(Ok(1), |r| self.black_height(r))?;
        if lh != rh {
            return Err(format!("black heights differ: {lh} vs {rh}"));
        }
        Ok(lh + usize::from(n.color == Color::Black))
    }
}

/// In-order walk over the keys of one tree.
#[cfg(test)]
pub(crate) struct InOrder<'a, T> {
    arena: &'a TreeArena<T>,
    at: Option<TreeKey>,
}

#[cfg(test)]
impl<'a, T> Iterator for InOrder<'a, T> {
    type Item = TreeKey;
    #[inline]
    fn next(&mut self) -> Option<TreeKey> {
        let k = self.at?;
        self.at = self.arena.successor(k);
        Some(k)
    }
}

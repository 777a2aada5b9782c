use core::borrow::Borrow;
use core::cmp::Ordering;

use alloc::vec::Vec;

use super::arena::Arena;
use super::branching::Branching;
use super::handle::Handle;
use super::node::{InternalNode, LeafNode, Node, SearchResult};

/// The core B-tree implementation backing `VBTreeMap`.
///
/// Both mutating algorithms are *proactive*: insertion splits any full node
/// and deletion tops up any minimal node before descending into it, so a
/// single downward pass always suffices and no operation ever has to revisit
/// an ancestor.
pub(crate) struct RawVBTreeMap<K, V> {
    /// Arena storing all tree nodes.
    nodes: Arena<Node<K>>,
    /// Arena storing all values (separate from nodes for cache efficiency).
    values: Arena<V>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Total number of key-value pairs in the tree.
    len: usize,
    /// Capacity policy fixed at construction.
    branching: Branching,
}

/// What `insert` decided to do at the current node.
enum InsertStep {
    /// Key already present; overwrite the value behind this handle.
    Replace(Handle),
    /// Current node is a leaf with room; insert at this position.
    InsertAt(usize),
    /// Keep descending, splitting the child first if it is full.
    Descend { index: usize, child: Handle, split: bool },
}

/// What `remove_entry` decided to do at the current node.
enum RemoveStep {
    Missing,
    TakeFromLeaf(usize),
    TakeFromInternal(usize),
    Descend(usize),
}

impl<K, V> RawVBTreeMap<K, V> {
    /// Creates a new, empty tree with the given capacity policy.
    pub(crate) const fn new(branching: Branching) -> Self {
        Self {
            nodes: Arena::new(),
            values: Arena::new(),
            root: None,
            len: 0,
            branching,
        }
    }

    /// Returns the number of key-value pairs in the tree.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree contains no elements.
    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the capacity policy of this tree.
    pub(crate) const fn branching(&self) -> Branching {
        self.branching
    }

    /// Clears all elements from the tree. The branching factor is kept.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.root = None;
        self.len = 0;
    }

    /// Returns a reference to the root node, if any.
    pub(crate) fn root(&self) -> Option<Handle> {
        self.root
    }

    /// Returns a reference to a node by handle.
    pub(crate) fn node(&self, handle: Handle) -> &Node<K> {
        self.nodes.get(handle)
    }

    /// Returns a reference to a value by handle.
    pub(crate) fn value(&self, handle: Handle) -> &V {
        self.values.get(handle)
    }

    /// Drains all key-value pairs from the tree in key order.
    pub(crate) fn drain_to_vec(&mut self) -> Vec<(K, V)> {
        let mut drained = Vec::with_capacity(self.len);
        if let Some(root) = self.root {
            self.drain_node(root, &mut drained);
        }
        self.clear();
        drained
    }

    fn drain_node(&mut self, handle: Handle, out: &mut Vec<(K, V)>) {
        match self.nodes.take(handle) {
            Node::Leaf(leaf) => {
                let (keys, values) = leaf.into_parts();
                for (key, value) in keys.into_iter().zip(values) {
                    out.push((key, self.values.take(value)));
                }
            }
            Node::Internal(internal) => {
                let (keys, values, children) = internal.into_parts();
                let mut children = children.into_iter();
                let first = children.next().expect("`drain_node()` - internal node has no children!");
                self.drain_node(first, out);
                for ((key, value), child) in keys.into_iter().zip(values).zip(children) {
                    out.push((key, self.values.take(value)));
                    self.drain_node(child, out);
                }
            }
        }
    }
}

impl<K: Ord, V> RawVBTreeMap<K, V> {
    /// Searches for a key, returning the holding node and entry index.
    ///
    /// Unlike a B+tree there is no separator level to fall through: a hit in
    /// an internal node *is* the entry, so the returned node may be either
    /// variant.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<(Handle, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root?;

        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => match internal.search(key) {
                    SearchResult::Found(index) => return Some((current, index)),
                    SearchResult::NotFound(index) => current = internal.child(index),
                },
                Node::Leaf(leaf) => {
                    if let SearchResult::Found(index) = leaf.search(key) {
                        return Some((current, index));
                    }
                    return None;
                }
            }
        }
    }

    /// Returns a reference to the value corresponding to the key.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (handle, index) = self.search(key)?;
        Some(self.values.get(self.nodes.get(handle).value(index)))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (handle, index) = self.search(key)?;
        let value = self.nodes.get(handle).value(index);
        Some(self.values.get_mut(value))
    }

    /// Returns the key-value pair corresponding to the key.
    pub(crate) fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (handle, index) = self.search(key)?;
        let node = self.nodes.get(handle);
        Some((node.key(index), self.values.get(node.value(index))))
    }

    /// Returns true if the tree contains the specified key.
    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key).is_some()
    }

    /// Returns the first (minimum-key) entry in the tree.
    pub(crate) fn first_key_value(&self) -> Option<(&K, &V)> {
        let mut current = self.root?;

        // The minimum always lives in the leftmost leaf; internal entries
        // separate children and so can never be smaller than child 0.
        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => current = internal.child(0),
                Node::Leaf(leaf) => return Some((leaf.key(0), self.values.get(leaf.value(0)))),
            }
        }
    }

    /// Returns the last (maximum-key) entry in the tree.
    pub(crate) fn last_key_value(&self) -> Option<(&K, &V)> {
        let mut current = self.root?;

        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => current = internal.child(internal.child_count() - 1),
                Node::Leaf(leaf) => {
                    let index = leaf.key_count() - 1;
                    return Some((leaf.key(index), self.values.get(leaf.value(index))));
                }
            }
        }
    }

    /// Inserts a key-value pair into the tree.
    /// Returns the old value if the key was already present.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        let Some(root) = self.root else {
            let value = self.values.alloc(value);
            let mut leaf = LeafNode::new();
            leaf.push_back(key, value);
            self.root = Some(self.nodes.alloc(Node::Leaf(leaf)));
            self.len = 1;
            return None;
        };

        // Split a full root up front; this is the only way the tree grows
        // taller, and it establishes the descent invariant that the node we
        // are standing in always has room for a promoted median.
        let mut current = if self.nodes.get(root).key_count() == self.branching.max_keys() {
            self.grow_root(root)
        } else {
            root
        };

        loop {
            let step = match self.nodes.get(current) {
                Node::Leaf(leaf) => match leaf.search(&key) {
                    SearchResult::Found(index) => InsertStep::Replace(leaf.value(index)),
                    SearchResult::NotFound(index) => InsertStep::InsertAt(index),
                },
                Node::Internal(internal) => match internal.search(&key) {
                    SearchResult::Found(index) => InsertStep::Replace(internal.value(index)),
                    SearchResult::NotFound(index) => {
                        let child = internal.child(index);
                        InsertStep::Descend {
                            index,
                            child,
                            split: self.nodes.get(child).key_count() == self.branching.max_keys(),
                        }
                    }
                },
            };

            match step {
                InsertStep::Replace(handle) => {
                    // Key exists; replace the value in place to avoid alloc/free churn.
                    return Some(core::mem::replace(self.values.get_mut(handle), value));
                }
                InsertStep::InsertAt(index) => {
                    let value = self.values.alloc(value);
                    self.nodes.get_mut(current).as_leaf_mut().insert(index, key, value);
                    self.len += 1;
                    return None;
                }
                InsertStep::Descend { index, child, split } => {
                    let mut next = child;
                    if split {
                        let right = self.split_child(current, index);
                        // The child's median was promoted to `index`; re-aim
                        // the descent around it (or land on it exactly).
                        let node = self.nodes.get(current).as_internal();
                        match key.cmp(node.key(index)) {
                            Ordering::Less => {}
                            Ordering::Greater => next = right,
                            Ordering::Equal => {
                                let handle = node.value(index);
                                return Some(core::mem::replace(self.values.get_mut(handle), value));
                            }
                        }
                    }
                    current = next;
                }
            }
        }
    }

    /// Replaces a full root by a fresh empty root holding it as an only
    /// child, then splits it. Returns the new root.
    fn grow_root(&mut self, old_root: Handle) -> Handle {
        let new_root = self.nodes.alloc(Node::Internal(InternalNode::with_first_child(old_root)));
        self.root = Some(new_root);
        self.split_child(new_root, 0);
        new_root
    }

    /// Splits the full child at `index` of `parent`, promoting its median
    /// entry into `parent`. Returns the handle of the new right half.
    fn split_child(&mut self, parent: Handle, index: usize) -> Handle {
        let child = self.nodes.get(parent).as_internal().child(index);

        let (median, right) = match self.nodes.get_mut(child) {
            Node::Leaf(leaf) => {
                let (median, right) = leaf.split(self.branching);
                (median, Node::Leaf(right))
            }
            Node::Internal(internal) => {
                let (median, right) = internal.split(self.branching);
                (median, Node::Internal(right))
            }
        };

        let right = self.nodes.alloc(right);
        let (median_key, median_value) = median;
        self.nodes.get_mut(parent).as_internal_mut().insert_split(index, median_key, median_value, right);
        right
    }

    /// Removes a key from the tree and returns the value.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes a key from the tree and returns the key-value pair.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root?;

        loop {
            let step = match self.nodes.get(current) {
                Node::Leaf(leaf) => match leaf.search(key) {
                    SearchResult::Found(index) => RemoveStep::TakeFromLeaf(index),
                    SearchResult::NotFound(_) => RemoveStep::Missing,
                },
                Node::Internal(internal) => match internal.search(key) {
                    SearchResult::Found(index) => RemoveStep::TakeFromInternal(index),
                    SearchResult::NotFound(index) => RemoveStep::Descend(index),
                },
            };

            match step {
                RemoveStep::Missing => return None,
                RemoveStep::TakeFromLeaf(index) => {
                    // Non-root leaves were topped up to at least `b` keys on
                    // the way down, so this removal cannot underflow them.
                    let (key, value) = self.nodes.get_mut(current).as_leaf_mut().remove(index);
                    return Some((key, self.finish_removal(value)));
                }
                RemoveStep::TakeFromInternal(index) => {
                    let (left, right) = {
                        let internal = self.nodes.get(current).as_internal();
                        (internal.child(index), internal.child(index + 1))
                    };
                    let factor = self.branching.factor();

                    if self.nodes.get(left).key_count() >= factor {
                        // The in-order predecessor replaces the doomed entry.
                        let (pred_key, pred_value) = self.remove_rightmost(left);
                        let (key, value) =
                            self.nodes.get_mut(current).as_internal_mut().replace_entry(index, pred_key, pred_value);
                        return Some((key, self.finish_removal(value)));
                    }

                    if self.nodes.get(right).key_count() >= factor {
                        // Symmetric: the in-order successor replaces it.
                        let (succ_key, succ_value) = self.remove_leftmost(right);
                        let (key, value) =
                            self.nodes.get_mut(current).as_internal_mut().replace_entry(index, succ_key, succ_value);
                        return Some((key, self.finish_removal(value)));
                    }

                    // Both children minimal: fold child, entry and sibling
                    // into one full node and hunt the key down in there.
                    current = self.merge_children(current, index);
                }
                RemoveStep::Descend(index) => {
                    current = self.fix_child(current, index);
                }
            }
        }
    }

    /// Removes and returns the first key-value pair.
    pub(crate) fn pop_first(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        let (key, value) = self.remove_leftmost(root);
        Some((key, self.finish_removal(value)))
    }

    /// Removes and returns the last key-value pair.
    pub(crate) fn pop_last(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        let (key, value) = self.remove_rightmost(root);
        Some((key, self.finish_removal(value)))
    }

    /// Books a completed removal: reclaims the value, drops the count and
    /// collapses an emptied tree back to its starting state.
    fn finish_removal(&mut self, value: Handle) -> V {
        let value = self.values.take(value);
        self.len -= 1;
        if self.len == 0 {
            self.nodes.clear();
            self.root = None;
        }
        value
    }

    /// Removes the maximum entry of the subtree rooted at `current`,
    /// applying the usual top-up rule down the right spine.
    ///
    /// The caller guarantees `current` either is the root or holds at least
    /// `b` keys, so removals below it can never underflow it.
    fn remove_rightmost(&mut self, mut current: Handle) -> (K, Handle) {
        loop {
            let last_child = match self.nodes.get(current) {
                Node::Leaf(_) => None,
                Node::Internal(internal) => Some(internal.child_count() - 1),
            };
            match last_child {
                None => return self.nodes.get_mut(current).as_leaf_mut().pop_back(),
                Some(index) => current = self.fix_child(current, index),
            }
        }
    }

    /// Mirror image of [`Self::remove_rightmost`]: takes the subtree minimum
    /// off the left spine.
    fn remove_leftmost(&mut self, mut current: Handle) -> (K, Handle) {
        loop {
            let is_leaf = matches!(self.nodes.get(current), Node::Leaf(_));
            if is_leaf {
                return self.nodes.get_mut(current).as_leaf_mut().pop_front();
            }
            current = self.fix_child(current, 0);
        }
    }

    /// Ensures the child at `index` of `parent` can afford to lose a key,
    /// rotating one in from a sibling or merging with one. Returns the node
    /// the descent should continue into.
    fn fix_child(&mut self, parent: Handle, index: usize) -> Handle {
        let (child, left_sibling, right_sibling) = {
            let node = self.nodes.get(parent).as_internal();
            let left = (index > 0).then(|| node.child(index - 1));
            let right = (index + 1 < node.child_count()).then(|| node.child(index + 1));
            (node.child(index), left, right)
        };

        if self.nodes.get(child).key_count() >= self.branching.factor() {
            return child;
        }

        if let Some(left) = left_sibling
            && self.nodes.get(left).key_count() > self.branching.min_keys()
        {
            self.rotate_from_left(parent, index);
            return child;
        }

        if let Some(right) = right_sibling
            && self.nodes.get(right).key_count() > self.branching.min_keys()
        {
            self.rotate_from_right(parent, index);
            return child;
        }

        // No sibling can lend: merge with whichever exists. Every non-root
        // internal node has at least two children, so one of them does.
        if left_sibling.is_some() {
            self.merge_children(parent, index - 1)
        } else {
            self.merge_children(parent, index)
        }
    }

    /// Rotates one entry clockwise through the separator: the left sibling's
    /// last entry moves up into `parent` and the old separator drops down to
    /// the front of the child (along with the sibling's last child).
    fn rotate_from_left(&mut self, parent: Handle, index: usize) {
        let (donor, child) = {
            let node = self.nodes.get(parent).as_internal();
            (node.child(index - 1), node.child(index))
        };

        let (donor_key, donor_value, donor_child) = match self.nodes.get_mut(donor) {
            Node::Leaf(leaf) => {
                let (key, value) = leaf.pop_back();
                (key, value, None)
            }
            Node::Internal(internal) => {
                let (key, value) = internal.pop_back();
                (key, value, Some(internal.pop_back_child()))
            }
        };

        let (separator_key, separator_value) =
            self.nodes.get_mut(parent).as_internal_mut().replace_entry(index - 1, donor_key, donor_value);

        match self.nodes.get_mut(child) {
            Node::Leaf(leaf) => leaf.push_front(separator_key, separator_value),
            Node::Internal(internal) => {
                internal.push_front(separator_key, separator_value);
                // Siblings sit at the same depth, so the donor is internal too.
                internal.push_front_child(donor_child.expect("`rotate_from_left()` - donor is a leaf!"));
            }
        }
    }

    /// Mirror image of [`Self::rotate_from_left`].
    fn rotate_from_right(&mut self, parent: Handle, index: usize) {
        let (donor, child) = {
            let node = self.nodes.get(parent).as_internal();
            (node.child(index + 1), node.child(index))
        };

        let (donor_key, donor_value, donor_child) = match self.nodes.get_mut(donor) {
            Node::Leaf(leaf) => {
                let (key, value) = leaf.pop_front();
                (key, value, None)
            }
            Node::Internal(internal) => {
                let (key, value) = internal.pop_front();
                (key, value, Some(internal.pop_front_child()))
            }
        };

        let (separator_key, separator_value) =
            self.nodes.get_mut(parent).as_internal_mut().replace_entry(index, donor_key, donor_value);

        match self.nodes.get_mut(child) {
            Node::Leaf(leaf) => leaf.push_back(separator_key, separator_value),
            Node::Internal(internal) => {
                internal.push_back(separator_key, separator_value);
                internal.push_back_child(donor_child.expect("`rotate_from_right()` - donor is a leaf!"));
            }
        }
    }

    /// Merges the children either side of separator `index` (both minimal)
    /// and the separator itself into a single full node. Returns the merged
    /// node; a root emptied by the merge hands the tree over to it.
    fn merge_children(&mut self, parent: Handle, index: usize) -> Handle {
        let (separator_key, separator_value, right) =
            self.nodes.get_mut(parent).as_internal_mut().remove_split(index);
        let left = self.nodes.get(parent).as_internal().child(index);

        match self.nodes.take(right) {
            Node::Leaf(right_leaf) => {
                self.nodes.get_mut(left).as_leaf_mut().merge_with_right((separator_key, separator_value), right_leaf);
            }
            Node::Internal(right_internal) => {
                self.nodes
                    .get_mut(left)
                    .as_internal_mut()
                    .merge_with_right((separator_key, separator_value), right_internal);
            }
        }

        if self.root == Some(parent) && self.nodes.get(parent).key_count() == 0 {
            // The merge drained the root; the tree shrinks by one level.
            self.nodes.free(parent);
            self.root = Some(left);
        }

        left
    }
}

impl<K: Clone, V: Clone> Clone for RawVBTreeMap<K, V> {
    fn clone(&self) -> Self {
        fn clone_node<K: Clone, V: Clone>(
            source: &RawVBTreeMap<K, V>,
            nodes: &mut Arena<Node<K>>,
            values: &mut Arena<V>,
            handle: Handle,
        ) -> Handle {
            match source.nodes.get(handle) {
                Node::Leaf(leaf) => {
                    let mut copy = LeafNode::new();
                    for index in 0..leaf.key_count() {
                        let value = values.alloc(source.values.get(leaf.value(index)).clone());
                        copy.push_back(leaf.key(index).clone(), value);
                    }
                    nodes.alloc(Node::Leaf(copy))
                }
                Node::Internal(internal) => {
                    let first = clone_node(source, nodes, values, internal.child(0));
                    let mut copy = InternalNode::with_first_child(first);
                    for index in 0..internal.key_count() {
                        let value = values.alloc(source.values.get(internal.value(index)).clone());
                        copy.push_back(internal.key(index).clone(), value);
                        let child = clone_node(source, nodes, values, internal.child(index + 1));
                        copy.push_back_child(child);
                    }
                    nodes.alloc(Node::Internal(copy))
                }
            }
        }

        let mut nodes = Arena::new();
        let mut values = Arena::new();
        let root = self.root.map(|root| clone_node(self, &mut nodes, &mut values, root));

        Self {
            nodes,
            values,
            root,
            len: self.len,
            branching: self.branching,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::uninlined_format_args)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;
    use alloc::vec;
    use proptest::prelude::*;

    impl<K: Ord + Clone + core::fmt::Debug, V: Clone> RawVBTreeMap<K, V> {
        /// Validates every structural invariant. Panics with a descriptive
        /// message if any is violated; intended for tests only.
        pub(crate) fn validate_invariants(&self) {
            let Some(root) = self.root else {
                assert_eq!(self.len, 0, "Empty tree should have len 0");
                assert!(self.nodes.is_empty(), "Empty tree should hold no nodes");
                assert!(self.values.is_empty(), "Empty tree should hold no values");
                return;
            };

            let mut errors: Vec<String> = Vec::new();
            let mut leaf_depth: Option<usize> = None;
            let total = self.validate_node(root, 0, None, None, &mut leaf_depth, &mut errors);

            if total != self.len {
                errors.push(format!("len mismatch: self.len={}, traversal count={}", self.len, total));
            }
            if self.nodes.get(root).key_count() == 0 {
                errors.push("Non-empty tree has a zero-key root".into());
            }

            assert!(errors.is_empty(), "Tree invariant violations:\n{}", errors.join("\n"));
        }

        /// Returns `(entry count of subtree)`, accumulating violations.
        fn validate_node(
            &self,
            handle: Handle,
            depth: usize,
            lower: Option<&K>,
            upper: Option<&K>,
            leaf_depth: &mut Option<usize>,
            errors: &mut Vec<String>,
        ) -> usize {
            let node = self.nodes.get(handle);
            let count = node.key_count();

            if count > self.branching.max_keys() {
                errors.push(format!(
                    "Node {:?} has {} keys, above the maximum {}",
                    handle,
                    count,
                    self.branching.max_keys()
                ));
            }
            if depth > 0 && count < self.branching.min_keys() {
                errors.push(format!(
                    "Non-root node {:?} has {} keys, below the minimum {}",
                    handle,
                    count,
                    self.branching.min_keys()
                ));
            }

            // Keys strictly increasing and strictly inside the separator window.
            for index in 0..count {
                let key = node.key(index);
                if index > 0 && node.key(index - 1) >= key {
                    errors.push(format!("Keys out of order at node {:?}, index {}", handle, index));
                }
                if let Some(lower) = lower
                    && key <= lower
                {
                    errors.push(format!("Key {:?} at node {:?} escapes its lower bound", key, handle));
                }
                if let Some(upper) = upper
                    && key >= upper
                {
                    errors.push(format!("Key {:?} at node {:?} escapes its upper bound", key, handle));
                }
            }

            match node {
                Node::Leaf(_) => {
                    match *leaf_depth {
                        None => *leaf_depth = Some(depth),
                        Some(expected) => {
                            if depth != expected {
                                errors.push(format!(
                                    "Leaf depth mismatch: expected {}, got {} at handle {:?}",
                                    expected, depth, handle
                                ));
                            }
                        }
                    }
                    count
                }
                Node::Internal(internal) => {
                    if internal.child_count() != count + 1 {
                        errors.push(format!(
                            "Internal node {:?} has {} keys but {} children",
                            handle,
                            count,
                            internal.child_count()
                        ));
                        return count;
                    }

                    let mut total = count;
                    for index in 0..internal.child_count() {
                        let child_lower = if index == 0 { lower } else { Some(internal.key(index - 1)) };
                        let child_upper = if index == count { upper } else { Some(internal.key(index)) };
                        total += self.validate_node(
                            internal.child(index),
                            depth + 1,
                            child_lower,
                            child_upper,
                            leaf_depth,
                            errors,
                        );
                    }
                    total
                }
            }
        }

        /// In-order snapshot of the tree for test comparisons.
        pub(crate) fn entries(&self) -> Vec<(K, V)> {
            fn walk<K: Clone, V: Clone>(tree: &RawVBTreeMap<K, V>, handle: Handle, out: &mut Vec<(K, V)>) {
                match tree.nodes.get(handle) {
                    Node::Leaf(leaf) => {
                        for index in 0..leaf.key_count() {
                            out.push((leaf.key(index).clone(), tree.values.get(leaf.value(index)).clone()));
                        }
                    }
                    Node::Internal(internal) => {
                        for index in 0..internal.key_count() {
                            walk(tree, internal.child(index), out);
                            out.push((internal.key(index).clone(), tree.values.get(internal.value(index)).clone()));
                        }
                        walk(tree, internal.child(internal.child_count() - 1), out);
                    }
                }
            }

            let mut out = Vec::with_capacity(self.len);
            if let Some(root) = self.root {
                walk(self, root, &mut out);
            }
            out
        }
    }

    // Test operations enum for property testing.
    #[derive(Clone, Debug)]
    enum Op {
        Insert(i32),
        Remove(i32),
        PopFirst,
        PopLast,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0i32..1000).prop_map(Op::Insert),
            2 => (0i32..1000).prop_map(Op::Remove),
            1 => Just(Op::PopFirst),
            1 => Just(Op::PopLast),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Replays random op sequences at several branching factors against
        /// `alloc`'s BTreeMap, validating every invariant after every step.
        #[test]
        fn tree_matches_model_at_any_factor(
            factor in 2usize..=16,
            ops in prop::collection::vec(op_strategy(), 0..400),
        ) {
            let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(factor));
            let mut model: alloc::collections::BTreeMap<i32, i32> = alloc::collections::BTreeMap::new();

            for op in ops {
                match op {
                    Op::Insert(key) => {
                        prop_assert_eq!(tree.insert(key, key * 2), model.insert(key, key * 2));
                    }
                    Op::Remove(key) => {
                        prop_assert_eq!(tree.remove(&key), model.remove(&key));
                    }
                    Op::PopFirst => {
                        prop_assert_eq!(tree.pop_first(), model.pop_first());
                    }
                    Op::PopLast => {
                        prop_assert_eq!(tree.pop_last(), model.pop_last());
                    }
                }

                tree.validate_invariants();
                prop_assert_eq!(tree.len(), model.len());
            }

            let expected: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(tree.entries(), expected);
        }

        /// Inserting then removing every key, in an arbitrary order, must
        /// drain the tree completely.
        #[test]
        fn drains_to_empty(
            factor in 2usize..=8,
            mut keys in prop::collection::vec(0i32..10_000, 1..200),
        ) {
            let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(factor));
            for &key in &keys {
                tree.insert(key, key);
            }

            // Remove in a different order than insertion.
            keys.sort_unstable();
            keys.dedup();
            keys.reverse();
            for &key in &keys {
                prop_assert!(tree.remove(&key).is_some());
                tree.validate_invariants();
            }

            prop_assert!(tree.is_empty());
            prop_assert_eq!(tree.len(), 0);
        }

        /// Structural clones preserve contents, length and branching.
        #[test]
        fn clone_preserves_contents(keys in prop::collection::vec(0i32..1000, 0..200)) {
            let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(3));
            for &key in &keys {
                tree.insert(key, key * 2);
            }

            let copy = tree.clone();
            copy.validate_invariants();
            prop_assert_eq!(copy.len(), tree.len());
            prop_assert_eq!(copy.branching(), tree.branching());
            prop_assert_eq!(copy.entries(), tree.entries());
        }

        /// `drain_to_vec` yields sorted entries and leaves the tree empty.
        #[test]
        fn drain_to_vec_is_sorted(keys in prop::collection::vec(0i32..1000, 0..200)) {
            let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(4));
            let mut model: alloc::collections::BTreeMap<i32, i32> = alloc::collections::BTreeMap::new();
            for &key in &keys {
                tree.insert(key, key * 2);
                model.insert(key, key * 2);
            }

            let drained = tree.drain_to_vec();
            let expected: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(drained, expected);
            prop_assert!(tree.is_empty());
            tree.validate_invariants();
        }
    }

    #[test]
    fn empty_tree_operations() {
        let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::DEFAULT);
        tree.validate_invariants();

        assert!(tree.get(&1).is_none());
        assert!(!tree.contains_key(&1));
        assert!(tree.remove(&1).is_none());
        assert!(tree.pop_first().is_none());
        assert!(tree.pop_last().is_none());
        assert!(tree.first_key_value().is_none());
        assert!(tree.last_key_value().is_none());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn overwrite_keeps_len() {
        let mut tree: RawVBTreeMap<i32, &str> = RawVBTreeMap::new(Branching::new(2));
        assert_eq!(tree.insert(7, "first"), None);
        assert_eq!(tree.insert(7, "second"), Some("first"));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&7), Some(&"second"));
        tree.validate_invariants();
    }

    #[test]
    fn overwrite_reaches_internal_entries() {
        // Push enough keys at b = 2 to promote several into internal nodes,
        // then overwrite every key and verify each landed.
        let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(2));
        for key in 0..32 {
            tree.insert(key, key);
        }
        for key in 0..32 {
            assert_eq!(tree.insert(key, -key), Some(key));
        }
        tree.validate_invariants();
        assert_eq!(tree.len(), 32);
        for key in 0..32 {
            assert_eq!(tree.get(&key), Some(&-key));
        }
    }

    #[test]
    fn root_leaf_fills_before_first_split() {
        let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::DEFAULT);

        // 31 keys fit in a single root leaf at the default factor.
        for key in 1..=31 {
            tree.insert(key, key);
        }
        tree.validate_invariants();
        assert!(matches!(tree.nodes.get(tree.root.unwrap()), Node::Leaf(leaf) if leaf.key_count() == 31));

        // The 32nd key forces the root split: a one-entry internal root over
        // a 15-key leaf and a 16-key leaf.
        tree.insert(32, 32);
        tree.validate_invariants();

        let root = tree.nodes.get(tree.root.unwrap()).as_internal();
        assert_eq!(root.key_count(), 1);
        assert_eq!(*root.key(0), 16);
        assert_eq!(tree.nodes.get(root.child(0)).key_count(), 15);
        assert_eq!(tree.nodes.get(root.child(1)).key_count(), 16);
    }

    #[test]
    fn small_factor_underflow_is_repaired() {
        let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(2));
        for key in [10, 20, 5, 6, 12, 30, 7, 17] {
            tree.insert(key, key);
        }
        tree.validate_invariants();

        let keys: Vec<i32> = tree.entries().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![5, 6, 7, 10, 12, 17, 20, 30]);

        // These removals force borrow/merge repairs; the validator enforces
        // that no non-root node drops below one key at b = 2.
        assert_eq!(tree.remove(&6), Some(6));
        tree.validate_invariants();
        assert_eq!(tree.remove(&7), Some(7));
        tree.validate_invariants();

        let keys: Vec<i32> = tree.entries().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![5, 10, 12, 17, 20, 30]);
    }

    #[test]
    fn height_shrinks_when_root_drains() {
        let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(2));
        for key in 0..16 {
            tree.insert(key, key);
        }
        assert!(matches!(tree.nodes.get(tree.root.unwrap()), Node::Internal(_)));

        for key in 0..15 {
            assert_eq!(tree.remove(&key), Some(key));
            tree.validate_invariants();
        }

        // One entry left: the tree must have collapsed back to a root leaf.
        assert!(matches!(tree.nodes.get(tree.root.unwrap()), Node::Leaf(_)));
        assert_eq!(tree.get(&15), Some(&15));
    }

    #[test]
    fn pop_first_and_last_walk_inward() {
        let mut tree: RawVBTreeMap<i32, i32> = RawVBTreeMap::new(Branching::new(2));
        for key in 0..20 {
            tree.insert(key, key * 10);
        }

        for key in 0..10 {
            assert_eq!(tree.pop_first(), Some((key, key * 10)));
            assert_eq!(tree.pop_last(), Some((19 - key, (19 - key) * 10)));
            tree.validate_invariants();
        }

        assert!(tree.is_empty());
    }
}

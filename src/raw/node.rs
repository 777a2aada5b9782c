use core::borrow::Borrow;

use smallvec::SmallVec;

use super::branching::Branching;
use super::handle::Handle;

// Inline capacity covers a full node at the default branching factor; maps
// built with a larger factor spill their runs to the heap.
const INLINE_ENTRIES: usize = Branching::DEFAULT.max_keys();
const INLINE_CHILDREN: usize = INLINE_ENTRIES + 1;

pub(crate) type KeyRun<K> = SmallVec<[K; INLINE_ENTRIES]>;
pub(crate) type ValueRun = SmallVec<[Handle; INLINE_ENTRIES]>;
pub(crate) type ChildRun = SmallVec<[Handle; INLINE_CHILDREN]>;

/// A tree node. Unlike a B+tree, *every* node stores key-value entries; an
/// internal node's entries double as the separators between its children.
#[allow(clippy::large_enum_variant)]
pub(crate) enum Node<K> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K>),
}

/// Internal node: `n` entries interleaved with `n + 1` children. Entry `i`
/// is strictly greater than everything in child `i` and strictly less than
/// everything in child `i + 1`.
pub(crate) struct InternalNode<K> {
    keys: KeyRun<K>,
    values: ValueRun,
    children: ChildRun,
}

/// Leaf node: a sorted run of entries and nothing else.
pub(crate) struct LeafNode<K> {
    keys: KeyRun<K>,
    values: ValueRun,
}

/// Result of searching for a key in a node.
pub(crate) enum SearchResult {
    /// Key was found at the given index.
    Found(usize),
    /// Key was not found; index is the child to descend into (or, in a leaf,
    /// where the key would be inserted).
    NotFound(usize),
}

#[inline]
fn search_keys<K, Q>(keys: &[K], key: &Q) -> SearchResult
where
    K: Borrow<Q>,
    Q: ?Sized + Ord,
{
    match keys.binary_search_by(|k| k.borrow().cmp(key)) {
        Ok(index) => SearchResult::Found(index),
        Err(index) => SearchResult::NotFound(index),
    }
}

impl<K> Node<K> {
    /// Returns the leaf node, panicking if this is not a leaf.
    pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("expected leaf node"),
        }
    }

    /// Returns the internal node, panicking if this is not internal.
    pub(crate) fn as_internal(&self) -> &InternalNode<K> {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("expected internal node"),
        }
    }

    /// Returns the internal node mutably, panicking if this is not internal.
    pub(crate) fn as_internal_mut(&mut self) -> &mut InternalNode<K> {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("expected internal node"),
        }
    }

    /// Returns the number of entries in this node.
    pub(crate) fn key_count(&self) -> usize {
        match self {
            Node::Internal(internal) => internal.key_count(),
            Node::Leaf(leaf) => leaf.key_count(),
        }
    }

    /// Returns the key at the given index, in either variant.
    pub(crate) fn key(&self, index: usize) -> &K {
        match self {
            Node::Internal(internal) => internal.key(index),
            Node::Leaf(leaf) => leaf.key(index),
        }
    }

    /// Returns the value handle at the given index, in either variant.
    pub(crate) fn value(&self, index: usize) -> Handle {
        match self {
            Node::Internal(internal) => internal.value(index),
            Node::Leaf(leaf) => leaf.value(index),
        }
    }
}

impl<K> InternalNode<K> {
    /// Creates an internal node with a single child and no entries yet; only
    /// ever used as a fresh root about to receive a split.
    pub(crate) fn with_first_child(child: Handle) -> Self {
        let mut children = ChildRun::new();
        children.push(child);
        Self {
            keys: KeyRun::new(),
            values: ValueRun::new(),
            children,
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> Handle {
        self.values[index]
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Handle {
        self.children[index]
    }

    #[inline]
    pub(crate) fn search<Q>(&self, key: &Q) -> SearchResult
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        search_keys(&self.keys, key)
    }

    /// Swaps the entry at `index` for a replacement, returning the old entry.
    pub(crate) fn replace_entry(&mut self, index: usize, key: K, value: Handle) -> (K, Handle) {
        let old_key = core::mem::replace(&mut self.keys[index], key);
        let old_value = core::mem::replace(&mut self.values[index], value);
        (old_key, old_value)
    }

    /// Records a child split: the promoted median entry lands at `index` and
    /// the new right half becomes the child after it.
    pub(crate) fn insert_split(&mut self, index: usize, key: K, value: Handle, right: Handle) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
        self.children.insert(index + 1, right);
    }

    /// Undoes a split shape: removes the entry at `index` and the child after
    /// it, returning both. The caller owns folding them into the left child.
    pub(crate) fn remove_split(&mut self, index: usize) -> (K, Handle, Handle) {
        let key = self.keys.remove(index);
        let value = self.values.remove(index);
        let right = self.children.remove(index + 1);
        (key, value, right)
    }

    pub(crate) fn push_front(&mut self, key: K, value: Handle) {
        self.keys.insert(0, key);
        self.values.insert(0, value);
    }

    pub(crate) fn push_front_child(&mut self, child: Handle) {
        self.children.insert(0, child);
    }

    pub(crate) fn push_back(&mut self, key: K, value: Handle) {
        self.keys.push(key);
        self.values.push(value);
    }

    pub(crate) fn push_back_child(&mut self, child: Handle) {
        self.children.push(child);
    }

    pub(crate) fn pop_front(&mut self) -> (K, Handle) {
        (self.keys.remove(0), self.values.remove(0))
    }

    pub(crate) fn pop_front_child(&mut self) -> Handle {
        self.children.remove(0)
    }

    pub(crate) fn pop_back(&mut self) -> (K, Handle) {
        let key = self.keys.pop().expect("`InternalNode::pop_back()` - node is empty!");
        let value = self.values.pop().expect("`InternalNode::pop_back()` - node is empty!");
        (key, value)
    }

    pub(crate) fn pop_back_child(&mut self) -> Handle {
        self.children.pop().expect("`InternalNode::pop_back_child()` - node has no children!")
    }

    /// Splits a full node in half. Keeps the low `b - 1` entries, returns the
    /// median entry and a new node holding the high `b - 1` entries and the
    /// high `b` children.
    pub(crate) fn split(&mut self, branching: Branching) -> ((K, Handle), InternalNode<K>) {
        let median = branching.min_keys();
        debug_assert_eq!(self.keys.len(), branching.max_keys());

        let right = InternalNode {
            keys: self.keys.drain(median + 1..).collect(),
            values: self.values.drain(median + 1..).collect(),
            children: self.children.drain(median + 1..).collect(),
        };

        let median_key = self.keys.pop().expect("`InternalNode::split()` - node is empty!");
        let median_value = self.values.pop().expect("`InternalNode::split()` - node is empty!");

        ((median_key, median_value), right)
    }

    /// Absorbs the separator entry and the entire right sibling.
    pub(crate) fn merge_with_right(&mut self, separator: (K, Handle), mut right: InternalNode<K>) {
        self.keys.push(separator.0);
        self.values.push(separator.1);
        self.keys.append(&mut right.keys);
        self.values.append(&mut right.values);
        self.children.append(&mut right.children);
    }

    pub(crate) fn into_parts(self) -> (KeyRun<K>, ValueRun, ChildRun) {
        (self.keys, self.values, self.children)
    }
}

impl<K> LeafNode<K> {
    /// Creates a new empty leaf node.
    pub(crate) fn new() -> Self {
        Self {
            keys: KeyRun::new(),
            values: ValueRun::new(),
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> Handle {
        self.values[index]
    }

    #[inline]
    pub(crate) fn search<Q>(&self, key: &Q) -> SearchResult
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        search_keys(&self.keys, key)
    }

    /// Inserts an entry at the given position.
    pub(crate) fn insert(&mut self, index: usize, key: K, value: Handle) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    /// Removes and returns the entry at the given position.
    pub(crate) fn remove(&mut self, index: usize) -> (K, Handle) {
        (self.keys.remove(index), self.values.remove(index))
    }

    pub(crate) fn push_front(&mut self, key: K, value: Handle) {
        self.keys.insert(0, key);
        self.values.insert(0, value);
    }

    pub(crate) fn push_back(&mut self, key: K, value: Handle) {
        self.keys.push(key);
        self.values.push(value);
    }

    pub(crate) fn pop_front(&mut self) -> (K, Handle) {
        (self.keys.remove(0), self.values.remove(0))
    }

    pub(crate) fn pop_back(&mut self) -> (K, Handle) {
        let key = self.keys.pop().expect("`LeafNode::pop_back()` - leaf is empty!");
        let value = self.values.pop().expect("`LeafNode::pop_back()` - leaf is empty!");
        (key, value)
    }

    /// Splits a full leaf in half, exactly as [`InternalNode::split`] but with
    /// no children to divide.
    pub(crate) fn split(&mut self, branching: Branching) -> ((K, Handle), LeafNode<K>) {
        let median = branching.min_keys();
        debug_assert_eq!(self.keys.len(), branching.max_keys());

        let right = LeafNode {
            keys: self.keys.drain(median + 1..).collect(),
            values: self.values.drain(median + 1..).collect(),
        };

        let median_key = self.keys.pop().expect("`LeafNode::split()` - leaf is empty!");
        let median_value = self.values.pop().expect("`LeafNode::split()` - leaf is empty!");

        ((median_key, median_value), right)
    }

    /// Absorbs the separator entry and the entire right sibling.
    pub(crate) fn merge_with_right(&mut self, separator: (K, Handle), mut right: LeafNode<K>) {
        self.keys.push(separator.0);
        self.values.push(separator.1);
        self.keys.append(&mut right.keys);
        self.values.append(&mut right.values);
    }

    pub(crate) fn into_parts(self) -> (KeyRun<K>, ValueRun) {
        (self.keys, self.values)
    }
}

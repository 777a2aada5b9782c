use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::iter::FusedIterator;
use core::ops::{Bound, Index, RangeBounds};

use smallvec::SmallVec;

use crate::raw::{Handle, Node, RawVBTreeMap};

mod branching;

/// A cursor frame: a node and the index of the next entry to visit in it.
type Frame = (Handle, usize);

/// Inline capacity covers the deepest tree a `u32` handle space can produce
/// at the minimum branching factor; deeper stacks spill to the heap.
type FrameStack = SmallVec<[Frame; 12]>;

/// Extends `stack` with the path from `handle` down to its leftmost leaf.
///
/// Every frame is pushed with position 0, so unwinding the stack visits each
/// node's entries and children in order.
fn push_leftmost<K, V>(tree: &RawVBTreeMap<K, V>, stack: &mut FrameStack, mut handle: Handle) {
    loop {
        stack.push((handle, 0));
        match tree.node(handle) {
            Node::Internal(internal) => handle = internal.child(0),
            Node::Leaf(_) => return,
        }
    }
}

/// Mirror image of [`push_leftmost`]: descends to the rightmost leaf, with
/// each frame's position holding the count of entries still unvisited from
/// the back.
fn push_rightmost<K, V>(tree: &RawVBTreeMap<K, V>, stack: &mut FrameStack, mut handle: Handle) {
    loop {
        let node = tree.node(handle);
        stack.push((handle, node.key_count()));
        match node {
            Node::Internal(internal) => handle = internal.child(internal.child_count() - 1),
            Node::Leaf(_) => return,
        }
    }
}

/// An ordered map based on a [B-Tree].
///
/// Given a key type with a [total order], an ordered map stores its entries in key order.
/// That means that keys must be of a type that implements the [`Ord`] trait,
/// such that two keys can always be compared to determine their [`Ordering`].
/// Examples of keys with a total order are strings with lexicographical order,
/// and numbers with their natural order.
///
/// Iterators obtained from functions such as [`VBTreeMap::iter`], [`VBTreeMap::into_iter`],
/// [`VBTreeMap::values`], or [`VBTreeMap::keys`] produce their items in key order, and take
/// worst-case logarithmic and amortized constant time per item returned.
///
/// Unlike the standard library's map, the branching factor is chosen at runtime:
/// [`VBTreeMap::with_branching`] builds a map whose nodes hold between `b - 1`
/// and `2b - 1` entries for any `b >= 2`. Two maps with different branching
/// factors but equal contents compare equal; the factor shapes the tree, never
/// its observable ordering.
///
/// It is a logic error for a key to be modified in such a way that the key's ordering relative to
/// any other key, as determined by the [`Ord`] trait, changes while it is in the map. This is
/// normally only possible through [`Cell`], [`RefCell`], global state, I/O, or unsafe code.
/// The behavior resulting from such a logic error is not specified, but will be encapsulated to the
/// `VBTreeMap` that observed the logic error and not result in undefined behavior. This could
/// include panics, incorrect results, aborts, memory leaks, and non-termination.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// // type inference lets us omit an explicit type signature (which
/// // would be `VBTreeMap<&str, &str>` in this example).
/// let mut movie_reviews = VBTreeMap::new();
///
/// // review some movies.
/// movie_reviews.insert("Office Space",       "Deals with real issues in the workplace.");
/// movie_reviews.insert("Pulp Fiction",       "Masterpiece.");
/// movie_reviews.insert("The Godfather",      "Very enjoyable.");
/// movie_reviews.insert("The Blues Brothers", "Eye lyked it a lot.");
///
/// // check for a specific one.
/// if !movie_reviews.contains_key("Les Miserables") {
///     println!("We've got {} reviews, but Les Miserables ain't one.",
///              movie_reviews.len());
/// }
///
/// // oops, this review has a lot of spelling mistakes, let's delete it.
/// movie_reviews.remove("The Blues Brothers");
///
/// // look up the values associated with some keys.
/// let to_find = ["Up!", "Office Space"];
/// for movie in &to_find {
///     match movie_reviews.get(movie) {
///        Some(review) => println!("{movie}: {review}"),
///        None => println!("{movie} is unreviewed.")
///     }
/// }
///
/// // Look up the value for a key (will panic if the key is not found).
/// println!("Movie review: {}", movie_reviews["Office Space"]);
///
/// // iterate over everything.
/// for (movie, review) in &movie_reviews {
///     println!("{movie}: \"{review}\"");
/// }
/// ```
///
/// A `VBTreeMap` with a known list of items can be initialized from an array:
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let solar_distance = VBTreeMap::from([
///     ("Mercury", 0.4),
///     ("Venus", 0.7),
///     ("Earth", 1.0),
///     ("Mars", 1.5),
/// ]);
/// ```
///
/// # Background
///
/// A B-tree is (like) a [binary search tree], but adapted to the natural granularity that modern
/// machines like to consume data at: each node contains an entire array of elements instead of
/// just a single element. This implementation is the classic B-tree of the textbooks, where every
/// node (internal and leaf alike) stores entries and an internal node's entries double as the
/// separators between its children.
///
/// Both mutating operations work in a single pass from the root down. Insertion splits any full
/// node it is about to enter, so there is always room for a promoted median; deletion tops up any
/// minimal node it is about to enter by borrowing from a sibling or merging with one, so removal
/// at the bottom can never underflow an ancestor. Neither operation ever revisits a node.
///
/// Our implementation uses binary search within each node, giving O(log B) comparisons per node
/// and O(log B * log n) = O(log n) total comparisons for tree operations. This matches the
/// asymptotic complexity of a standard BST while providing better cache locality due to the
/// larger node size.
///
/// [B-Tree]: https://en.wikipedia.org/wiki/B-tree
/// [binary search tree]: https://en.wikipedia.org/wiki/Binary_search_tree
/// [total order]: https://en.wikipedia.org/wiki/Total_order
/// [`Cell`]: core::cell::Cell
/// [`RefCell`]: core::cell::RefCell
pub struct VBTreeMap<K, V> {
    raw: RawVBTreeMap<K, V>,
}

/// An iterator over the entries of a `VBTreeMap`.
///
/// This `struct` is created by the [`iter`] method on [`VBTreeMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let map = VBTreeMap::from([(1, "a"), (2, "b")]);
/// let mut iter = map.iter();
/// assert_eq!(iter.next(), Some((&1, &"a")));
/// assert_eq!(iter.next_back(), Some((&2, &"b")));
/// assert_eq!(iter.next(), None);
/// ```
///
/// [`iter`]: VBTreeMap::iter
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    tree: Option<&'a RawVBTreeMap<K, V>>,
    front: FrameStack,
    back: FrameStack,
    /// Entries not yet yielded from either end; the two cursors have crossed
    /// exactly when this reaches zero.
    remaining: usize,
}

/// An owning iterator over the entries of a `VBTreeMap`, sorted by key.
///
/// This `struct` is created by the [`into_iter`] method on [`VBTreeMap`]
/// (provided by the [`IntoIterator`] trait). See its documentation for more.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let map = VBTreeMap::from([(1, "a"), (2, "b")]);
/// let mut iter = map.into_iter();
/// assert_eq!(iter.next(), Some((1, "a")));
/// assert_eq!(iter.next_back(), Some((2, "b")));
/// assert_eq!(iter.next(), None);
/// ```
///
/// [`into_iter`]: IntoIterator::into_iter
pub struct IntoIter<K, V> {
    inner: alloc::vec::IntoIter<(K, V)>,
}

/// An iterator over the keys of a `VBTreeMap`.
///
/// This `struct` is created by the [`keys`] method on [`VBTreeMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let map = VBTreeMap::from([(2, "b"), (1, "a")]);
/// let keys: Vec<_> = map.keys().copied().collect();
/// assert_eq!(keys, [1, 2]);
/// ```
///
/// [`keys`]: VBTreeMap::keys
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

/// An iterator over the values of a `VBTreeMap`.
///
/// This `struct` is created by the [`values`] method on [`VBTreeMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let map = VBTreeMap::from([(1, "a"), (2, "b")]);
/// let values: Vec<_> = map.values().copied().collect();
/// assert_eq!(values, ["a", "b"]);
/// ```
///
/// [`values`]: VBTreeMap::values
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

/// An owning iterator over the keys of a `VBTreeMap`.
///
/// This `struct` is created by the [`into_keys`] method on [`VBTreeMap`].
/// See its documentation for more.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let map = VBTreeMap::from([(2, "b"), (1, "a")]);
/// let mut keys = map.into_keys();
/// assert_eq!(keys.next(), Some(1));
/// assert_eq!(keys.next_back(), Some(2));
/// assert_eq!(keys.next(), None);
/// ```
///
/// [`into_keys`]: VBTreeMap::into_keys
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IntoKeys<K, V> {
    inner: IntoIter<K, V>,
}

/// An owning iterator over the values of a `VBTreeMap`.
///
/// This `struct` is created by the [`into_values`] method on [`VBTreeMap`].
/// See its documentation for more.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let map = VBTreeMap::from([(1, "hello"), (2, "goodbye")]);
/// let mut values = map.into_values();
/// assert_eq!(values.next(), Some("hello"));
/// assert_eq!(values.next_back(), Some("goodbye"));
/// assert_eq!(values.next(), None);
/// ```
///
/// [`into_values`]: VBTreeMap::into_values
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IntoValues<K, V> {
    inner: IntoIter<K, V>,
}

/// An iterator over a sub-range of entries in a `VBTreeMap`.
///
/// This `struct` is created by the [`range`] method on [`VBTreeMap`]. See its
/// documentation for more.
///
/// # Examples
///
/// ```
/// use vb_tree::VBTreeMap;
///
/// let map = VBTreeMap::from([(1, "a"), (2, "b"), (3, "c")]);
/// let mut range = map.range(2..=3);
/// assert_eq!(range.next(), Some((&2, &"b")));
/// assert_eq!(range.next(), Some((&3, &"c")));
/// assert_eq!(range.next(), None);
/// ```
///
/// [`range`]: VBTreeMap::range
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, K, V, T: ?Sized, R> {
    tree: Option<&'a RawVBTreeMap<K, V>>,
    front: FrameStack,
    /// The range is kept so the end bound can be re-checked on every step.
    range: R,
    done: bool,
    _marker: core::marker::PhantomData<&'a T>,
}

impl<K, V> VBTreeMap<K, V> {
    /// Makes a new, empty `VBTreeMap` with the default branching factor.
    ///
    /// Does not allocate anything on its own.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    ///
    /// // entries can now be inserted into the empty map
    /// map.insert(1, "a");
    /// ```
    #[must_use]
    pub const fn new() -> VBTreeMap<K, V> {
        VBTreeMap {
            raw: RawVBTreeMap::new(crate::raw::Branching::DEFAULT),
        }
    }

    /// Clears the map, removing all elements. The branching factor is kept.
    ///
    /// # Complexity
    ///
    /// O(n)
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut a = VBTreeMap::new();
    /// a.insert(1, "a");
    /// a.clear();
    /// assert!(a.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Returns the number of elements in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut a = VBTreeMap::new();
    /// assert_eq!(a.len(), 0);
    /// a.insert(1, "a");
    /// assert_eq!(a.len(), 1);
    /// ```
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map contains no elements.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut a = VBTreeMap::new();
    /// assert!(a.is_empty());
    /// a.insert(1, "a");
    /// assert!(!a.is_empty());
    /// ```
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.get(key)
    }

    /// Returns the key-value pair corresponding to the supplied key. This is
    /// potentially useful:
    /// - for key types where non-identical keys can be considered equal;
    /// - for getting the `&K` stored key value from a borrowed `&Q` lookup key; or
    /// - for getting a reference to a key with the same lifetime as the collection.
    ///
    /// The supplied key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get_key_value(&1), Some((&1, &"a")));
    /// assert_eq!(map.get_key_value(&2), None);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn get_key_value<Q>(&self, k: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.get_key_value(k)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// if let Some(x) = map.get_mut(&1) {
    ///     *x = "b";
    /// }
    /// assert_eq!(map[&1], "b");
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.get_mut(key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.contains_key(&1), true);
    /// assert_eq!(map.contains_key(&2), false);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.contains_key(key)
    }

    /// Returns the first key-value pair in the map.
    /// The key in this pair is the minimum key in the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// assert_eq!(map.first_key_value(), None);
    /// map.insert(1, "b");
    /// map.insert(2, "a");
    /// assert_eq!(map.first_key_value(), Some((&1, &"b")));
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[allow(clippy::must_use_candidate)]
    pub fn first_key_value(&self) -> Option<(&K, &V)>
    where
        K: Ord,
    {
        self.raw.first_key_value()
    }

    /// Returns the last key-value pair in the map.
    /// The key in this pair is the maximum key in the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// assert_eq!(map.last_key_value(), None);
    /// map.insert(1, "b");
    /// map.insert(2, "a");
    /// assert_eq!(map.last_key_value(), Some((&2, &"a")));
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[allow(clippy::must_use_candidate)]
    pub fn last_key_value(&self) -> Option<(&K, &V)>
    where
        K: Ord,
    {
        self.raw.last_key_value()
    }

    /// Removes and returns the first element in the map.
    /// The key of this element is the minimum key that was in the map.
    ///
    /// # Examples
    ///
    /// Draining elements in ascending order, while keeping a usable map each iteration.
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// while let Some((key, _val)) = map.pop_first() {
    ///     assert!(map.iter().all(|(k, _v)| *k > key));
    /// }
    /// assert!(map.is_empty());
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn pop_first(&mut self) -> Option<(K, V)>
    where
        K: Ord,
    {
        self.raw.pop_first()
    }

    /// Removes and returns the last element in the map.
    /// The key of this element is the maximum key that was in the map.
    ///
    /// # Examples
    ///
    /// Draining elements in descending order, while keeping a usable map each iteration.
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// while let Some((key, _val)) = map.pop_last() {
    ///     assert!(map.iter().all(|(k, _v)| *k < key));
    /// }
    /// assert!(map.is_empty());
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn pop_last(&mut self) -> Option<(K, V)>
    where
        K: Ord,
    {
        self.raw.pop_last()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, `None` is returned.
    ///
    /// If the map did have this key present, the value is updated, and the old
    /// value is returned. The key is not updated, though; this matters for
    /// types that can be `==` without being identical.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.is_empty(), false);
    ///
    /// map.insert(37, "b");
    /// assert_eq!(map.insert(37, "c"), Some("b"));
    /// assert_eq!(map[&37], "c");
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn insert(&mut self, key: K, value: V) -> Option<V>
    where
        K: Ord,
    {
        self.raw.insert(key, value)
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.remove(key)
    }

    /// Removes a key from the map, returning the stored key and value if the
    /// key was previously in the map.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove_entry(&1), Some((1, "a")));
    /// assert_eq!(map.remove_entry(&1), None);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
    {
        self.raw.remove_entry(key)
    }

    /// Gets an iterator over the entries of the map, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(3, "c");
    /// map.insert(2, "b");
    /// map.insert(1, "a");
    ///
    /// for (key, value) in map.iter() {
    ///     println!("{key}: {value}");
    /// }
    ///
    /// let (first_key, first_value) = map.iter().next().unwrap();
    /// assert_eq!((*first_key, *first_value), (1, "a"));
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; O(1) amortized per iteration step.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut front = FrameStack::new();
        let mut back = FrameStack::new();
        if let Some(root) = self.raw.root() {
            push_leftmost(&self.raw, &mut front, root);
            push_rightmost(&self.raw, &mut back, root);
        }
        Iter {
            tree: Some(&self.raw),
            front,
            back,
            remaining: self.raw.len(),
        }
    }

    /// Gets an iterator over the keys of the map, in sorted order.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut a = VBTreeMap::new();
    /// a.insert(2, "b");
    /// a.insert(1, "a");
    ///
    /// let keys: Vec<_> = a.keys().cloned().collect();
    /// assert_eq!(keys, [1, 2]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; O(1) amortized per iteration step.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Gets an iterator over the values of the map, in order by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut a = VBTreeMap::new();
    /// a.insert(1, "hello");
    /// a.insert(2, "goodbye");
    ///
    /// let values: Vec<_> = a.values().cloned().collect();
    /// assert_eq!(values, ["hello", "goodbye"]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; O(1) amortized per iteration step.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Constructs an iterator over a sub-range of elements in the map.
    /// The simplest way is to use the range syntax `min..max`, thus `range(min..max)` will
    /// yield elements from min (inclusive) to max (exclusive).
    /// The range may also be entered as `(Bound<T>, Bound<T>)`, so for example
    /// `range((Excluded(4), Included(10)))` will yield a left-exclusive, right-inclusive
    /// range from 4 to 10.
    ///
    /// An inverted range (`start > end`) yields no elements rather than
    /// panicking, so callers can pass through untrusted bounds unchecked.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::ops::Bound::Included;
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::new();
    /// map.insert(3, "a");
    /// map.insert(5, "b");
    /// map.insert(8, "c");
    /// for (&key, &value) in map.range((Included(&4), Included(&8))) {
    ///     println!("{key}: {value}");
    /// }
    /// assert_eq!(Some((&5, &"b")), map.range(4..).next());
    /// assert_eq!(map.range(8..5).count(), 0);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(log n) to create the iterator; O(1) amortized per iteration step.
    pub fn range<T, R>(&self, range: R) -> Range<'_, K, V, T, R>
    where
        T: ?Sized + Ord,
        K: Borrow<T> + Ord,
        R: RangeBounds<T>,
    {
        let mut front = FrameStack::new();
        if let Some(root) = self.raw.root() {
            match range.start_bound() {
                Bound::Unbounded => push_leftmost(&self.raw, &mut front, root),
                Bound::Included(start) => self.seek(&mut front, root, start, false),
                Bound::Excluded(start) => self.seek(&mut front, root, start, true),
            }
        }
        Range {
            tree: Some(&self.raw),
            front,
            range,
            done: false,
            _marker: core::marker::PhantomData,
        }
    }

    /// Builds the frame stack positioned at the first entry `>= start` (or
    /// `> start` when `exclusive`), descending from `handle`.
    fn seek<T>(&self, stack: &mut FrameStack, mut handle: Handle, start: &T, exclusive: bool)
    where
        T: ?Sized + Ord,
        K: Borrow<T> + Ord,
    {
        use crate::raw::SearchResult;

        loop {
            match self.raw.node(handle) {
                Node::Leaf(leaf) => {
                    match leaf.search(start) {
                        SearchResult::Found(index) if exclusive => stack.push((handle, index + 1)),
                        SearchResult::Found(index) | SearchResult::NotFound(index) => stack.push((handle, index)),
                    }
                    return;
                }
                Node::Internal(internal) => match internal.search(start) {
                    SearchResult::Found(index) => {
                        if exclusive {
                            // Skip the matching entry; its successor is the
                            // leftmost entry of the child after it.
                            stack.push((handle, index + 1));
                            push_leftmost(&self.raw, stack, internal.child(index + 1));
                        } else {
                            stack.push((handle, index));
                        }
                        return;
                    }
                    SearchResult::NotFound(index) => {
                        stack.push((handle, index));
                        handle = internal.child(index);
                    }
                },
            }
        }
    }

    /// Creates a consuming iterator visiting all the keys, in sorted order.
    /// The map cannot be used after calling this.
    /// The iterator element type is `K`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut a = VBTreeMap::new();
    /// a.insert(2, "b");
    /// a.insert(1, "a");
    ///
    /// let keys: Vec<_> = a.into_keys().collect();
    /// assert_eq!(keys, [1, 2]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(n) to create the iterator (drains all elements); iteration is O(1) per element.
    pub fn into_keys(mut self) -> IntoKeys<K, V> {
        IntoKeys {
            inner: IntoIter {
                inner: self.raw.drain_to_vec().into_iter(),
            },
        }
    }

    /// Creates a consuming iterator visiting all the values, in order by key.
    /// The map cannot be used after calling this.
    /// The iterator element type is `V`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut a = VBTreeMap::new();
    /// a.insert(1, "hello");
    /// a.insert(2, "goodbye");
    ///
    /// let values: Vec<_> = a.into_values().collect();
    /// assert_eq!(values, ["hello", "goodbye"]);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(n) to create the iterator (drains all elements); iteration is O(1) per element.
    pub fn into_values(mut self) -> IntoValues<K, V> {
        IntoValues {
            inner: IntoIter {
                inner: self.raw.drain_to_vec().into_iter(),
            },
        }
    }
}

impl<K, V> Default for VBTreeMap<K, V> {
    /// Creates an empty `VBTreeMap` with the default branching factor.
    fn default() -> Self {
        VBTreeMap::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for VBTreeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Clone, V: Clone> Clone for VBTreeMap<K, V> {
    fn clone(&self) -> Self {
        VBTreeMap {
            raw: self.raw.clone(),
        }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for VBTreeMap<K, V> {
    /// Two maps are equal when they hold the same entries in the same order;
    /// tree shape and branching factor are not observable.
    fn eq(&self, other: &VBTreeMap<K, V>) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<K: Eq, V: Eq> Eq for VBTreeMap<K, V> {}

impl<K: PartialOrd, V: PartialOrd> PartialOrd for VBTreeMap<K, V> {
    fn partial_cmp(&self, other: &VBTreeMap<K, V>) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord, V: Ord> Ord for VBTreeMap<K, V> {
    fn cmp(&self, other: &VBTreeMap<K, V>) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K: Hash, V: Hash> Hash for VBTreeMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for entry in self.iter() {
            entry.hash(state);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for VBTreeMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> VBTreeMap<K, V> {
        let mut map = VBTreeMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for VBTreeMap<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K: Ord + Copy, V: Copy> Extend<(&'a K, &'a V)> for VBTreeMap<K, V> {
    fn extend<T: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: T) {
        self.extend(iter.into_iter().map(|(&key, &value)| (key, value)));
    }
}

impl<K: Ord, V, const N: usize> From<[(K, V); N]> for VBTreeMap<K, V> {
    fn from(arr: [(K, V); N]) -> Self {
        arr.into_iter().collect()
    }
}

impl<K, Q, V> Index<&Q> for VBTreeMap<K, V>
where
    K: Borrow<Q> + Ord,
    Q: ?Sized + Ord,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<'a, K, V> IntoIterator for &'a VBTreeMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V> IntoIterator for VBTreeMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    /// Gets an owning iterator over the entries of the map, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let map = VBTreeMap::from([(1, "a"), (2, "b")]);
    /// let mut iter = map.into_iter();
    /// assert_eq!(iter.next(), Some((1, "a")));
    /// assert_eq!(iter.next_back(), Some((2, "b")));
    /// ```
    fn into_iter(mut self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.raw.drain_to_vec().into_iter(),
        }
    }
}

impl<'a, K: 'a, V: 'a> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let tree = self.tree?;

        loop {
            let &(handle, pos) = self.front.last()?;
            match tree.node(handle) {
                Node::Leaf(leaf) => {
                    if pos < leaf.key_count() {
                        self.front.last_mut()?.1 += 1;
                        self.remaining -= 1;
                        return Some((leaf.key(pos), tree.value(leaf.value(pos))));
                    }
                    self.front.pop();
                }
                Node::Internal(internal) => {
                    if pos < internal.key_count() {
                        self.front.last_mut()?.1 += 1;
                        push_leftmost(tree, &mut self.front, internal.child(pos + 1));
                        self.remaining -= 1;
                        return Some((internal.key(pos), tree.value(internal.value(pos))));
                    }
                    self.front.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let tree = self.tree?;

        loop {
            let &(handle, pos) = self.back.last()?;
            match tree.node(handle) {
                Node::Leaf(leaf) => {
                    if pos > 0 {
                        self.back.last_mut()?.1 -= 1;
                        self.remaining -= 1;
                        return Some((leaf.key(pos - 1), tree.value(leaf.value(pos - 1))));
                    }
                    self.back.pop();
                }
                Node::Internal(internal) => {
                    if pos > 0 {
                        self.back.last_mut()?.1 -= 1;
                        push_rightmost(tree, &mut self.back, internal.child(pos - 1));
                        self.remaining -= 1;
                        return Some((internal.key(pos - 1), tree.value(internal.value(pos - 1))));
                    }
                    self.back.pop();
                }
            }
        }
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("remaining", &self.remaining).finish()
    }
}

impl<'a, K: 'a, V: 'a> Default for Iter<'a, K, V> {
    /// Creates an empty `vbtree_map::Iter`.
    ///
    /// ```
    /// # use vb_tree::vbtree_map;
    /// let iter: vbtree_map::Iter<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Iter {
            tree: None,
            front: FrameStack::new(),
            back: FrameStack::new(),
            remaining: 0,
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            tree: self.tree,
            front: self.front.clone(),
            back: self.back.clone(),
            remaining: self.remaining,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for IntoIter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter").field("len", &self.inner.len()).finish()
    }
}

impl<K, V> Default for IntoIter<K, V> {
    /// Creates an empty `vbtree_map::IntoIter`.
    ///
    /// ```
    /// # use vb_tree::vbtree_map;
    /// let iter: vbtree_map::IntoIter<u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        IntoIter {
            inner: alloc::vec::Vec::new().into_iter(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for Keys<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys").field("remaining", &self.inner.remaining).finish()
    }
}

impl<K, V> Default for Keys<'_, K, V> {
    /// Creates an empty `vbtree_map::Keys`.
    ///
    /// ```
    /// # use vb_tree::vbtree_map;
    /// let iter: vbtree_map::Keys<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Keys {
            inner: Iter::default(),
        }
    }
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }

    fn last(mut self) -> Option<Self::Item> {
        self.next_back()
    }
}

impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}

impl<K, V: fmt::Debug> fmt::Debug for Values<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values").field("remaining", &self.inner.remaining).finish()
    }
}

impl<K, V> Default for Values<'_, K, V> {
    /// Creates an empty `vbtree_map::Values`.
    ///
    /// ```
    /// # use vb_tree::vbtree_map;
    /// let iter: vbtree_map::Values<'_, u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        Values {
            inner: Iter::default(),
        }
    }
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Values {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Iterator for IntoKeys<K, V> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoKeys<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V> ExactSizeIterator for IntoKeys<K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for IntoKeys<K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for IntoKeys<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoKeys").field("len", &self.inner.len()).finish()
    }
}

impl<K, V> Default for IntoKeys<K, V> {
    /// Creates an empty `vbtree_map::IntoKeys`.
    ///
    /// ```
    /// # use vb_tree::vbtree_map;
    /// let iter: vbtree_map::IntoKeys<u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        IntoKeys {
            inner: IntoIter::default(),
        }
    }
}

impl<K, V> Iterator for IntoValues<K, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoValues<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for IntoValues<K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for IntoValues<K, V> {}

impl<K, V: fmt::Debug> fmt::Debug for IntoValues<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoValues").field("len", &self.inner.len()).finish()
    }
}

impl<K, V> Default for IntoValues<K, V> {
    /// Creates an empty `vbtree_map::IntoValues`.
    ///
    /// ```
    /// # use vb_tree::vbtree_map;
    /// let iter: vbtree_map::IntoValues<u8, u8> = Default::default();
    /// assert_eq!(iter.len(), 0);
    /// ```
    fn default() -> Self {
        IntoValues {
            inner: IntoIter::default(),
        }
    }
}

impl<'a, K, V, T, R> Iterator for Range<'a, K, V, T, R>
where
    K: Borrow<T> + Ord,
    T: ?Sized + Ord,
    R: RangeBounds<T>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let tree = self.tree?;

        loop {
            let Some(&(handle, pos)) = self.front.last() else {
                self.done = true;
                return None;
            };

            let entry = match tree.node(handle) {
                Node::Leaf(leaf) => {
                    if pos < leaf.key_count() {
                        self.front.last_mut()?.1 += 1;
                        Some((leaf.key(pos), tree.value(leaf.value(pos))))
                    } else {
                        self.front.pop();
                        None
                    }
                }
                Node::Internal(internal) => {
                    if pos < internal.key_count() {
                        self.front.last_mut()?.1 += 1;
                        push_leftmost(tree, &mut self.front, internal.child(pos + 1));
                        Some((internal.key(pos), tree.value(internal.value(pos))))
                    } else {
                        self.front.pop();
                        None
                    }
                }
            };

            if let Some((key, value)) = entry {
                // The start bound was resolved at construction; only the end
                // bound needs checking as the cursor advances.
                let within = match self.range.end_bound() {
                    Bound::Unbounded => true,
                    Bound::Included(end) => key.borrow() <= end,
                    Bound::Excluded(end) => key.borrow() < end,
                };
                if !within {
                    self.done = true;
                    return None;
                }
                return Some((key, value));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, self.tree.map(RawVBTreeMap::len))
        }
    }
}

impl<K, V, T, R> FusedIterator for Range<'_, K, V, T, R>
where
    K: Borrow<T> + Ord,
    T: ?Sized + Ord,
    R: RangeBounds<T>,
{
}

impl<K, V, T: ?Sized, R: fmt::Debug> fmt::Debug for Range<'_, K, V, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range").field("range", &self.range).field("done", &self.done).finish()
    }
}

impl<K, V, T: ?Sized, R: Clone> Clone for Range<'_, K, V, T, R> {
    fn clone(&self) -> Self {
        Range {
            tree: self.tree,
            front: self.front.clone(),
            range: self.range.clone(),
            done: self.done,
            _marker: core::marker::PhantomData,
        }
    }
}

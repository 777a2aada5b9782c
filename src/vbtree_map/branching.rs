use super::VBTreeMap;
use crate::raw::{Branching, RawVBTreeMap};

impl<K, V> VBTreeMap<K, V> {
    /// Creates an empty map with the given branching factor `b`.
    ///
    /// Every node of the map holds at most `2b - 1` entries and every node
    /// except the root holds at least `b - 1`. Larger factors give shallower
    /// trees and better cache behavior; `b = 2` yields the classic 2-3-4 tree
    /// and is mostly useful for exercising rebalancing in tests.
    ///
    /// This is an extension and is not part of the standard `BTreeMap` API.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is less than 2.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let mut map = VBTreeMap::with_branching(4);
    /// map.insert(1, "a");
    /// assert_eq!(map.branching(), 4);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub const fn with_branching(factor: usize) -> Self {
        VBTreeMap {
            raw: RawVBTreeMap::new(Branching::new(factor)),
        }
    }

    /// Returns the branching factor the map was built with.
    ///
    /// This is an extension and is not part of the standard `BTreeMap` API.
    ///
    /// # Examples
    ///
    /// ```
    /// use vb_tree::VBTreeMap;
    ///
    /// let map: VBTreeMap<i32, i32> = VBTreeMap::new();
    /// assert_eq!(map.branching(), 16);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub const fn branching(&self) -> usize {
        self.raw.branching().factor()
    }
}

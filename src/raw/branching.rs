/// The capacity policy of a tree: its branching factor `b` and the key-count
/// bounds derived from it.
///
/// Every node holds at most `2b - 1` keys; every node except the root holds at
/// least `b - 1`. An internal node always has one more child than it has keys,
/// so `b` is also the minimum fan-out of a non-root internal node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Branching(usize);

impl Branching {
    /// Factor used by [`new`](crate::VBTreeMap::new); sized so a node spans a
    /// couple of cache lines for typical key types.
    pub(crate) const DEFAULT: Self = Self(16);

    /// The smallest factor that still allows splits and merges (`2-3-4` tree).
    pub(crate) const MIN_FACTOR: usize = 2;

    pub(crate) const fn new(factor: usize) -> Self {
        assert!(
            factor >= Self::MIN_FACTOR,
            "`Branching::new()` - `factor` must be at least 2!"
        );
        Self(factor)
    }

    #[inline]
    pub(crate) const fn factor(self) -> usize {
        self.0
    }

    /// Minimum key count for any non-root node.
    #[inline]
    pub(crate) const fn min_keys(self) -> usize {
        self.0 - 1
    }

    /// Maximum key count for any node.
    #[inline]
    pub(crate) const fn max_keys(self) -> usize {
        2 * self.0 - 1
    }
}

use super::handle::Handle;
use super::ordered_map::OrderedMap;

/// What an entry of a node points at.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) enum Child<V> {
    /// Subtree stored in another node; the entry key is the subtree's maximum.
    Inner(Handle),
    /// Value stored inline in a leaf.
    Leaf(V),
}

impl<V> Child<V> {
    /// Returns the node handle, or `None` for a leaf value.
    #[inline]
    pub(crate) fn as_handle(&self) -> Option<Handle> {
        match self {
            Child::Inner(handle) => Some(*handle),
            Child::Leaf(_) => None,
        }
    }

    #[inline]
    pub(crate) fn as_value(&self) -> Option<&V> {
        match self {
            Child::Leaf(value) => Some(value),
            Child::Inner(_) => None,
        }
    }

    #[inline]
    pub(crate) fn as_value_mut(&mut self) -> Option<&mut V> {
        match self {
            Child::Leaf(value) => Some(value),
            Child::Inner(_) => None,
        }
    }

    pub(crate) fn into_value(self) -> Option<V> {
        match self {
            Child::Leaf(value) => Some(value),
            Child::Inner(_) => None,
        }
    }
}

/// One storage unit of the tree.
///
/// In a B+tree only leaves hold values. Inner nodes key each child by the maximum key of that
/// child's subtree, so `children.last_key()` of any node is the maximum of its whole subtree.
/// `prev`/`next` chain the leaves in key order and are unused on inner nodes.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct Node<K, V> {
    pub(crate) is_leaf: bool,
    pub(crate) children: OrderedMap<K, Child<V>>,
    pub(crate) prev: Option<Handle>,
    pub(crate) next: Option<Handle>,
}

impl<K, V> Node<K, V> {
    /// Creates a new empty leaf node.
    pub(crate) const fn new_leaf() -> Self {
        Self::with_children(true, OrderedMap::new())
    }

    /// Creates a new empty inner node.
    pub(crate) const fn new_inner() -> Self {
        Self::with_children(false, OrderedMap::new())
    }

    pub(crate) const fn with_children(is_leaf: bool, children: OrderedMap<K, Child<V>>) -> Self {
        Self {
            is_leaf,
            children,
            prev: None,
            next: None,
        }
    }

    /// Number of entries (values for leaves, subtrees for inner nodes).
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    /// Largest key of the subtree rooted here.
    #[inline]
    pub(crate) fn max_key(&self) -> Option<&K> {
        self.children.last_key()
    }
}

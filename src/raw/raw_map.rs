use core::borrow::Borrow;
use core::mem;
use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::vec::Vec;
use smallvec::SmallVec;

use super::arena::Arena;
use super::degree::Degrees;
use super::handle::Handle;
use super::node::Node;
use crate::error::{Result, invariant_broken};

mod insert;
mod remove;

/// Root-to-node chain of handles, root first.
pub(crate) type Path = SmallVec<[Handle; 16]>;

/// The B+tree backing `BigOrderedMap`.
///
/// The root node lives inline; every other node lives in `nodes` and is addressed by [`Handle`].
/// While the root is a leaf, `min_leaf` and `max_leaf` are both [`Handle::ROOT`].
#[derive(Clone)]
pub(crate) struct RawMap<K, V> {
    root: Node<K, V>,
    nodes: Arena<Node<K, V>>,
    /// Leftmost leaf, for forward iteration.
    min_leaf: Handle,
    /// Rightmost leaf, for backward iteration.
    max_leaf: Handle,
    degrees: Degrees,
    len: usize,
    identity: MapId,
    /// Bumped by every mutation; cursors compare against it.
    generation: u64,
}

/// Identity of one map instance. A clone is a different map and gets a new identity.
#[derive(Debug)]
struct MapId(usize);

impl MapId {
    fn fresh() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Clone for MapId {
    fn clone(&self) -> Self {
        Self::fresh()
    }
}

/// Which map, and which state of it, a cursor was taken from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Version {
    map: usize,
    generation: u64,
}

/// Position of one entry: a leaf and an index into its children.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct LeafPos {
    pub(crate) leaf: Handle,
    pub(crate) index: usize,
}

impl<K, V> RawMap<K, V> {
    pub(crate) fn new(degrees: Degrees, reuse_slots: bool) -> Self {
        Self {
            root: Node::new_leaf(),
            nodes: Arena::new(reuse_slots),
            min_leaf: Handle::ROOT,
            max_leaf: Handle::ROOT,
            degrees,
            len: 0,
            identity: MapId::fresh(),
            generation: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) const fn degrees(&self) -> &Degrees {
        &self.degrees
    }

    pub(crate) const fn version(&self) -> Version {
        Version {
            map: self.identity.0,
            generation: self.generation,
        }
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Number of nodes, the inline root included.
    pub(crate) const fn node_count(&self) -> usize {
        self.nodes.len() + 1
    }

    /// Number of levels from the root down to the leaves.
    pub(crate) fn height(&self) -> usize {
        let mut height = 1;
        let mut current = &self.root;
        while let Some(child) = current.children.values().first().and_then(|c| c.as_handle()) {
            current = self.nodes.get(child);
            height += 1;
        }
        height
    }

    #[inline]
    pub(crate) fn node(&self, handle: Handle) -> &Node<K, V> {
        if handle.is_root() { &self.root } else { self.nodes.get(handle) }
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, handle: Handle) -> &mut Node<K, V> {
        if handle.is_root() {
            &mut self.root
        } else {
            self.nodes.get_mut(handle)
        }
    }

    /// Position of the smallest entry.
    pub(crate) fn first_pos(&self) -> Option<LeafPos> {
        if self.is_empty() {
            return None;
        }
        Some(LeafPos {
            leaf: self.min_leaf,
            index: 0,
        })
    }

    /// Position of the largest entry.
    pub(crate) fn last_pos(&self) -> Option<LeafPos> {
        if self.is_empty() {
            return None;
        }
        let len = self.node(self.max_leaf).len();
        Some(LeafPos {
            leaf: self.max_leaf,
            index: len.checked_sub(1)?,
        })
    }

    /// Whether `pos` is the position of the smallest entry.
    pub(crate) fn is_first_pos(&self, pos: LeafPos) -> bool {
        pos.leaf == self.min_leaf && pos.index == 0
    }

    /// Steps forward, following the leaf chain at the end of a leaf.
    pub(crate) fn next_pos(&self, pos: LeafPos) -> Option<LeafPos> {
        let leaf = self.node(pos.leaf);
        if pos.index + 1 < leaf.len() {
            return Some(LeafPos {
                leaf: pos.leaf,
                index: pos.index + 1,
            });
        }
        let next = leaf.next?;
        Some(LeafPos { leaf: next, index: 0 })
    }

    /// Steps backward, following the leaf chain at the start of a leaf.
    pub(crate) fn prev_pos(&self, pos: LeafPos) -> Option<LeafPos> {
        if pos.index > 0 {
            return Some(LeafPos {
                leaf: pos.leaf,
                index: pos.index - 1,
            });
        }
        let prev = self.node(pos.leaf).prev?;
        let index = self.node(prev).len().checked_sub(1)?;
        Some(LeafPos { leaf: prev, index })
    }

    #[inline]
    pub(crate) fn key_at(&self, pos: LeafPos) -> &K {
        self.node(pos.leaf).children.key(pos.index)
    }

    #[inline]
    pub(crate) fn entry_at(&self, pos: LeafPos) -> Option<(&K, &V)> {
        let children = &self.node(pos.leaf).children;
        Some((children.key(pos.index), children.value(pos.index).as_value()?))
    }

    #[inline]
    pub(crate) fn value_at_mut(&mut self, pos: LeafPos) -> Option<&mut V> {
        self.node_mut(pos.leaf).children.value_mut(pos.index).as_value_mut()
    }

    /// Dismantles the tree, returning every entry in key order.
    pub(crate) fn into_sorted_entries(mut self) -> Result<Vec<(K, V)>> {
        let mut entries = Vec::with_capacity(self.len);
        let mut current = Some(self.min_leaf);
        while let Some(handle) = current {
            let leaf = if handle.is_root() {
                mem::replace(&mut self.root, Node::new_leaf())
            } else {
                let (slot, leaf) = self.nodes.remove_and_reserve(handle);
                self.nodes.free_reserved_slot(slot);
                leaf
            };
            current = leaf.next;
            for (key, child) in leaf.children.into_entries() {
                let value = child.into_value().ok_or_else(|| invariant_broken("inner child in leaf chain"))?;
                entries.push((key, value));
            }
        }
        if entries.len() != self.len {
            return Err(invariant_broken("leaf chain does not cover every entry"));
        }
        // Whatever is left are inner nodes; they own no values.
        let inner_nodes = self.nodes.drain().count();
        tracing::trace!(target: "big_ordered_map::root", inner_nodes, "tree dismantled");
        Ok(entries)
    }
}

impl<K: Ord + Clone, V> RawMap<K, V> {
    /// Descends to the leaf whose key range covers `key`.
    ///
    /// Separators are subtree maxima, so each level takes the first separator `>= key`. `None`
    /// means `key` is larger than every stored key.
    pub(crate) fn find_leaf<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = Handle::ROOT;
        loop {
            let node = self.node(current);
            if node.is_leaf {
                return Some(current);
            }
            let idx = node.children.lower_bound(key);
            if idx == node.len() {
                return None;
            }
            current = node.children.value(idx).as_handle()?;
        }
    }

    /// Like [`RawMap::find_leaf`], but returns every node on the way down, root first.
    pub(crate) fn find_leaf_path<Q>(&self, key: &Q) -> Option<Path>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path = Path::new();
        let mut current = Handle::ROOT;
        loop {
            path.push(current);
            let node = self.node(current);
            if node.is_leaf {
                return Some(path);
            }
            let idx = node.children.lower_bound(key);
            if idx == node.len() {
                return None;
            }
            current = node.children.value(idx).as_handle()?;
        }
    }

    /// Position of the first entry whose key is `>= key`.
    pub(crate) fn lower_bound<Q>(&self, key: &Q) -> Option<LeafPos>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf = self.find_leaf(key)?;
        let index = self.node(leaf).children.lower_bound(key);
        // Only an empty root leaf can end up past its last entry.
        (index < self.node(leaf).len()).then_some(LeafPos { leaf, index })
    }

    /// Position of the entry stored under exactly `key`.
    pub(crate) fn find<Q>(&self, key: &Q) -> Option<LeafPos>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let pos = self.lower_bound(key)?;
        (self.key_at(pos).borrow() == key).then_some(pos)
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let pos = self.find(key)?;
        self.entry_at(pos).map(|(_, v)| v)
    }

    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let pos = self.find(key)?;
        self.value_at_mut(pos)
    }
}

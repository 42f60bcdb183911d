use core::mem;

use super::{Path, RawMap};
use crate::encoded_size::EncodedSize;
use crate::error::{MapError, Result, invariant_broken};
use crate::raw::handle::Handle;
use crate::raw::node::{Child, Node};
use crate::raw::ordered_map::OrderedMap;

impl<K, V> RawMap<K, V>
where
    K: Ord + Clone + EncodedSize,
    V: EncodedSize,
{
    /// Inserts `key`/`value`, returning the value it replaced.
    ///
    /// Without `overwrite` an existing key fails with [`MapError::KeyAlreadyExists`]. Every error
    /// is raised before the tree is modified.
    pub(crate) fn insert(&mut self, key: K, value: V, overwrite: bool) -> Result<Option<V>> {
        self.degrees.validate_entry(&key, &value)?;

        let mut path = if self.root.is_leaf {
            Path::from_slice(&[Handle::ROOT])
        } else {
            match self.find_leaf_path(&key) {
                Some(path) => path,
                None => self.extend_rightmost_spine(&key)?,
            }
        };

        let replaced = self.add_at(&mut path, key, Child::Leaf(value), overwrite)?;
        let replaced = match replaced {
            Some(child) => Some(child.into_value().ok_or_else(|| invariant_broken("leaf held an inner child"))?),
            None => {
                self.len += 1;
                None
            }
        };
        self.bump_generation();
        Ok(replaced)
    }

    /// Re-keys the last child of every inner node on the rightmost spine to `key`, so that a key
    /// larger than the current maximum has a leaf to land in. Returns the path to that leaf.
    fn extend_rightmost_spine(&mut self, key: &K) -> Result<Path> {
        let mut path = Path::new();
        let mut current = Handle::ROOT;
        loop {
            path.push(current);
            let node = self.node_mut(current);
            if node.is_leaf {
                return Ok(path);
            }
            let (_, last) = node
                .children
                .pop_last()
                .ok_or_else(|| invariant_broken("inner node without children"))?;
            let child = last.as_handle().ok_or_else(|| invariant_broken("inner node held a leaf value"))?;
            node.children
                .insert(key.clone(), last)
                .map_err(|_| invariant_broken("new maximum already present"))?;
            current = child;
        }
    }

    /// Inserts `child` into the last node of `path`, splitting upwards as needed.
    fn add_at(&mut self, path: &mut Path, key: K, child: Child<V>, overwrite: bool) -> Result<Option<Child<V>>> {
        let handle = path.pop().ok_or_else(|| invariant_broken("empty insertion path"))?;
        let is_leaf = self.node(handle).is_leaf;
        let max_degree = self.degrees.max_degree(is_leaf);
        let node = self.node_mut(handle);

        if node.len() < max_degree {
            return if !is_leaf {
                node.children
                    .insert(key, child)
                    .map(|_| None)
                    .map_err(|_| invariant_broken("separator already present in parent"))
            } else if overwrite {
                Ok(node.children.upsert(key, child))
            } else {
                node.children.insert(key, child).map(|_| None).map_err(|_| MapError::KeyAlreadyExists)
            };
        }

        // Full node: settle the existing-key cases before anything moves.
        if let Some(idx) = node.children.find(&key) {
            return match (is_leaf, overwrite) {
                (true, true) => Ok(Some(node.children.replace_value(idx, child))),
                (true, false) => Err(MapError::KeyAlreadyExists),
                (false, _) => Err(invariant_broken("separator already present in full parent")),
            };
        }

        let handle = if handle.is_root() {
            let moved = self.promote_root(&key)?;
            path.push(Handle::ROOT);
            moved
        } else {
            handle
        };
        self.split_and_insert(path, handle, key, child, max_degree)?;
        Ok(None)
    }

    /// Moves the full root into a fresh slot and replaces it with an inner node whose only child is
    /// the old root. Returns the old root's new handle.
    fn promote_root(&mut self, key: &K) -> Result<Handle> {
        let old_root = mem::replace(&mut self.root, Node::new_inner());
        let separator = match old_root.max_key() {
            Some(max) if max > key => max.clone(),
            Some(_) => key.clone(),
            None => return Err(invariant_broken("promoting an empty root")),
        };
        let was_leaf = old_root.is_leaf;

        let (handle, slot) = self.nodes.reserve_slot();
        self.nodes.fill_reserved_slot(slot, old_root);
        self.root.children = OrderedMap::from_sorted([(separator, Child::Inner(handle))]);
        if was_leaf {
            self.min_leaf = handle;
            self.max_leaf = handle;
        }

        tracing::trace!(target: "big_ordered_map::root", ?handle, was_leaf, "root promoted");
        Ok(handle)
    }

    /// Inserts into the full node at `handle` and splits it.
    ///
    /// The smaller half moves to a new node on the left, the larger half stays at `handle`. Only
    /// the parent learns about the new node; the separator already pointing at `handle` still
    /// names its maximum.
    fn split_and_insert(
        &mut self,
        path: &mut Path,
        handle: Handle,
        key: K,
        child: Child<V>,
        max_degree: usize,
    ) -> Result<()> {
        let node = self.nodes.get_mut(handle);
        node.children
            .insert(key, child)
            .map_err(|_| invariant_broken("split entry already present"))?;

        let target = max_degree.div_ceil(2);
        let larger = node.children.trim(target);
        let smaller = mem::replace(&mut node.children, larger);
        let is_leaf = node.is_leaf;
        let old_prev = node.prev;

        let mut left = Node::with_children(is_leaf, smaller);
        let separator = left
            .max_key()
            .cloned()
            .ok_or_else(|| invariant_broken("split produced an empty node"))?;

        let (left_handle, slot) = self.nodes.reserve_slot();
        if is_leaf {
            left.prev = old_prev;
            left.next = Some(handle);
            self.nodes.get_mut(handle).prev = Some(left_handle);
            if let Some(prev) = old_prev {
                self.node_mut(prev).next = Some(left_handle);
            }
            if self.min_leaf == handle {
                self.min_leaf = left_handle;
            }
        }
        let left_len = left.len();
        self.nodes.fill_reserved_slot(slot, left);

        tracing::trace!(
            target: "big_ordered_map::split",
            ?handle,
            ?left_handle,
            is_leaf,
            left_len,
            right_len = self.nodes.get(handle).len(),
            "node split"
        );

        match self.add_at(path, separator, Child::Inner(left_handle), false)? {
            None => Ok(()),
            Some(_) => Err(invariant_broken("split separator replaced a parent entry")),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::super::tests::small_tree;
    use super::*;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;

    fn leaf_keys(tree: &RawMap<u32, u32>) -> Vec<Vec<u32>> {
        let mut leaves = Vec::new();
        let mut current = Some(tree.min_leaf);
        while let Some(handle) = current {
            let node = tree.node(handle);
            leaves.push(node.children.keys().to_vec());
            current = node.next;
        }
        leaves
    }

    #[test]
    fn fourth_insert_promotes_root_leaf() {
        let mut tree = small_tree();
        for k in [1, 2, 3] {
            tree.insert(k, k, false).unwrap();
        }
        assert!(tree.root.is_leaf);
        assert!(tree.min_leaf.is_root());

        tree.insert(4, 4, false).unwrap();
        tree.check_invariants();
        assert!(!tree.root.is_leaf);
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.root.children.keys(), &[2, 4]);
        assert_eq!(leaf_keys(&tree), [[1, 2].to_vec(), [3, 4].to_vec()]);
        assert!(!tree.max_leaf.is_root());
    }

    #[test]
    fn split_keeps_larger_half_in_place() {
        let mut tree = small_tree();
        for k in [10, 20, 30, 40] {
            tree.insert(k, k, false).unwrap();
        }
        let right = tree.max_leaf;
        tree.insert(35, 35, false).unwrap();
        tree.insert(36, 36, false).unwrap();
        tree.check_invariants();
        assert_eq!(tree.max_leaf, right);
        assert_eq!(tree.node(right).children.keys(), &[36, 40]);
    }

    #[test]
    fn new_maximum_rewrites_spine() {
        let mut tree = small_tree();
        for k in 0..20 {
            tree.insert(k, k, false).unwrap();
        }
        tree.insert(1_000, 0, false).unwrap();
        tree.check_invariants();
        assert_eq!(tree.root.max_key(), Some(&1_000));
        assert_eq!(tree.last_pos().map(|p| *tree.key_at(p)), Some(1_000));
    }

    #[test]
    fn duplicate_into_full_leaf_changes_nothing() {
        let mut tree = small_tree();
        for k in [1, 2, 3] {
            tree.insert(k, k, false).unwrap();
        }
        let version = tree.version();
        assert_eq!(tree.insert(2, 9, false), Err(MapError::KeyAlreadyExists));
        assert!(tree.root.is_leaf);
        assert_eq!(tree.version(), version);
        assert_eq!(tree.get(&2), Some(&2));

        assert_eq!(tree.insert(2, 9, true), Ok(Some(2)));
        assert!(tree.root.is_leaf);
        assert_eq!(tree.get(&2), Some(&9));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn descending_inserts_grow_evenly() {
        let mut tree = small_tree();
        for k in (0..200).rev() {
            tree.insert(k, k, false).unwrap();
            tree.check_invariants();
        }
        assert_eq!(tree.len(), 200);
        assert!(tree.height() <= 8);
    }
}

use core::borrow::Borrow;

use super::{Path, RawMap};
use crate::error::{MapError, Result, invariant_broken};
use crate::raw::handle::Handle;
use crate::raw::node::Child;

impl<K: Ord + Clone, V> RawMap<K, V> {
    /// Removes `key`, returning the stored key and value.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Result<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path = self.find_leaf_path(key).ok_or(MapError::KeyNotFound)?;
        let (key, child) = self.remove_at(&mut path, key)?;
        let value = child
            .into_value()
            .ok_or_else(|| invariant_broken("leaf held an inner child"))?;
        self.len -= 1;
        self.bump_generation();
        Ok((key, value))
    }

    pub(crate) fn pop_first(&mut self) -> Result<(K, V)> {
        let pos = self.first_pos().ok_or(MapError::Empty)?;
        let key = self.key_at(pos).clone();
        self.remove(&key)
    }

    pub(crate) fn pop_last(&mut self) -> Result<(K, V)> {
        let pos = self.last_pos().ok_or(MapError::Empty)?;
        let key = self.key_at(pos).clone();
        self.remove(&key)
    }

    /// Removes `key` from the last node of `path`, then restores the separators and occupancy of
    /// every ancestor that needs it.
    fn remove_at<Q>(&mut self, path: &mut Path, key: &Q) -> Result<(K, Child<V>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = path.pop().ok_or_else(|| invariant_broken("empty removal path"))?;
        let node = self.node_mut(handle);
        let (removed_key, removed) = node.children.remove(key).ok_or(MapError::KeyNotFound)?;

        if handle.is_root() {
            if !self.root.is_leaf && self.root.len() == 1 {
                self.demote_root()?;
            }
            return Ok((removed_key, removed));
        }

        let is_leaf = node.is_leaf;
        let len = node.len();
        let node_max = node
            .max_key()
            .cloned()
            .ok_or_else(|| invariant_broken("non-root node emptied"))?;
        if removed_key > node_max {
            self.update_key(path, &removed_key, node_max.clone())?;
        }

        let max_degree = self.degrees.max_degree(is_leaf);
        if len * 2 >= max_degree {
            return Ok((removed_key, removed));
        }
        self.rebalance(path, handle, node_max, max_degree)?;
        Ok((removed_key, removed))
    }

    /// Replaces the separator `old` with `new` in each ancestor on `path`, bottom up. Stops at the
    /// first ancestor where the replaced separator is not the last one, since nothing above it
    /// names that key.
    fn update_key(&mut self, path: &Path, old: &K, new: K) -> Result<()> {
        for &ancestor in path.iter().rev() {
            let children = &mut self.node_mut(ancestor).children;
            if !children.replace_key(old, new.clone()) {
                return Err(invariant_broken("separator missing from ancestor"));
            }
            if children.last_key() != Some(&new) {
                break;
            }
        }
        Ok(())
    }

    /// Refills the underfull node at `handle` from a sibling, or merges the two.
    ///
    /// The sibling is the next node under the same parent, or the previous one when `handle` is the
    /// parent's last child.
    fn rebalance(&mut self, path: &mut Path, handle: Handle, node_max: K, max_degree: usize) -> Result<()> {
        let parent = *path.last().ok_or_else(|| invariant_broken("non-root node without parent"))?;
        let siblings = &self.node(parent).children;
        let idx = siblings
            .find(&node_max)
            .ok_or_else(|| invariant_broken("node missing from its parent"))?;
        let sibling_is_prev = idx + 1 == siblings.len();
        let sibling_idx = if sibling_is_prev {
            idx.checked_sub(1)
                .ok_or_else(|| invariant_broken("inner node with a single child"))?
        } else {
            idx + 1
        };
        let sibling = siblings
            .value(sibling_idx)
            .as_handle()
            .ok_or_else(|| invariant_broken("inner node held a leaf value"))?;

        let sibling_len = self.node(sibling).len();
        if sibling_len.saturating_sub(1) * 2 >= max_degree {
            if sibling_is_prev {
                self.borrow_from_prev(path, handle, sibling)
            } else {
                self.borrow_from_next(path, handle, sibling, &node_max)
            }
        } else if sibling_is_prev {
            self.merge(path, sibling, handle)
        } else {
            self.merge(path, handle, sibling)
        }
    }

    fn borrow_from_prev(&mut self, path: &Path, handle: Handle, prev: Handle) -> Result<()> {
        let prev_node = self.node_mut(prev);
        let (moved_key, moved) = prev_node
            .children
            .pop_last()
            .ok_or_else(|| invariant_broken("borrowing from an empty sibling"))?;
        let prev_max = prev_node
            .max_key()
            .cloned()
            .ok_or_else(|| invariant_broken("borrow emptied the sibling"))?;

        self.node_mut(handle)
            .children
            .insert(moved_key.clone(), moved)
            .map_err(|_| invariant_broken("borrowed key already present"))?;
        tracing::trace!(target: "big_ordered_map::merge", ?handle, from = ?prev, "borrowed from previous sibling");
        self.update_key(path, &moved_key, prev_max)
    }

    fn borrow_from_next(&mut self, path: &Path, handle: Handle, next: Handle, node_max: &K) -> Result<()> {
        let (moved_key, moved) = self
            .node_mut(next)
            .children
            .pop_first()
            .ok_or_else(|| invariant_broken("borrowing from an empty sibling"))?;

        self.node_mut(handle)
            .children
            .insert(moved_key.clone(), moved)
            .map_err(|_| invariant_broken("borrowed key already present"))?;
        tracing::trace!(target: "big_ordered_map::merge", ?handle, from = ?next, "borrowed from next sibling");
        self.update_key(path, node_max, moved_key)
    }

    /// Folds `left` into its right neighbour `right` and frees `left`'s slot.
    ///
    /// The node holding the larger keys keeps its slot, so its separator in the parent stays valid
    /// and only `left`'s separator has to be removed from the parent.
    fn merge(&mut self, path: &mut Path, left: Handle, right: Handle) -> Result<()> {
        let (slot, left_node) = self.nodes.remove_and_reserve(left);
        let vacated_key = left_node
            .max_key()
            .cloned()
            .ok_or_else(|| invariant_broken("merging an empty node"))?;
        let is_leaf = left_node.is_leaf;
        let left_prev = left_node.prev;

        let right_node = self.nodes.get_mut(right);
        right_node.children.append_disjoint(left_node.children);
        let merged_len = right_node.len();
        if is_leaf {
            right_node.prev = left_prev;
            if let Some(prev) = left_prev {
                self.node_mut(prev).next = Some(right);
            }
            if self.min_leaf == left {
                self.min_leaf = right;
            }
        }
        self.nodes.free_reserved_slot(slot);

        tracing::trace!(target: "big_ordered_map::merge", ?left, ?right, is_leaf, merged_len, "nodes merged");

        self.remove_at(path, &vacated_key)
            .map_err(|err| match err {
                MapError::KeyNotFound => invariant_broken("merged node missing from its parent"),
                other => other,
            })
            .map(|_| ())
    }

    /// Replaces an inner root that has a single child with that child.
    fn demote_root(&mut self) -> Result<()> {
        let (_, only) = self
            .root
            .children
            .pop_last()
            .ok_or_else(|| invariant_broken("demoting an empty root"))?;
        let child = only
            .as_handle()
            .ok_or_else(|| invariant_broken("inner root held a leaf value"))?;
        let (slot, node) = self.nodes.remove_and_reserve(child);
        let is_leaf = node.is_leaf;
        self.root = node;
        self.nodes.free_reserved_slot(slot);
        if is_leaf {
            self.min_leaf = Handle::ROOT;
            self.max_leaf = Handle::ROOT;
        }

        tracing::trace!(target: "big_ordered_map::root", ?child, is_leaf, "root demoted");
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::super::tests::{small_tree, tree_with_degrees};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn removing_down_to_one_leaf_demotes_root() {
        let mut tree = small_tree();
        for k in 1..=4 {
            tree.insert(k, k, false).unwrap();
        }
        assert!(!tree.root.is_leaf);

        assert_eq!(tree.remove(&1), Ok((1, 1)));
        tree.check_invariants();
        assert!(tree.root.is_leaf);
        assert!(tree.min_leaf.is_root());
        assert!(tree.max_leaf.is_root());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.root.children.keys(), &[2, 3, 4]);
    }

    #[test]
    fn removing_the_maximum_updates_separators() {
        let mut tree = small_tree();
        for k in 1..=9 {
            tree.insert(k, k, false).unwrap();
        }
        assert_eq!(tree.remove(&9), Ok((9, 9)));
        tree.check_invariants();
        assert_eq!(tree.root.max_key(), Some(&8));
    }

    #[test]
    fn underfull_leaf_borrows_from_sibling() {
        let mut tree = small_tree();
        for k in [10, 20, 30, 40, 35] {
            tree.insert(k, k, false).unwrap();
        }
        // Leaves: [10, 20] [30, 35, 40]
        let nodes = tree.node_count();
        tree.remove(&10).unwrap();
        tree.check_invariants();
        assert_eq!(tree.node_count(), nodes);
        assert_eq!(tree.node(tree.min_leaf).children.keys(), &[20, 30]);
        assert_eq!(tree.root.children.keys(), &[30, 40]);
    }

    #[test]
    fn underfull_leaves_merge() {
        let mut tree = small_tree();
        for k in 0..40 {
            tree.insert(k, k, false).unwrap();
        }
        let peak = tree.node_count();
        for k in 0..36 {
            tree.remove(&k).unwrap();
            tree.check_invariants();
        }
        assert!(tree.node_count() < peak);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn missing_key_changes_nothing() {
        let mut tree = small_tree();
        for k in 0..10 {
            tree.insert(k * 2, k, false).unwrap();
        }
        let version = tree.version();
        assert_eq!(tree.remove(&7), Err(MapError::KeyNotFound));
        assert_eq!(tree.remove(&100), Err(MapError::KeyNotFound));
        assert_eq!(tree.version(), version);
        assert_eq!(tree.len(), 10);
        tree.check_invariants();
    }

    #[test]
    fn pops_drain_in_order() {
        let mut tree = small_tree();
        for k in 0..30 {
            tree.insert(k, k, false).unwrap();
        }
        for k in 0..15 {
            assert_eq!(tree.pop_first(), Ok((k, k)));
            assert_eq!(tree.pop_last(), Ok((29 - k, 29 - k)));
            tree.check_invariants();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.pop_first(), Err(MapError::Empty));
        assert_eq!(tree.pop_last(), Err(MapError::Empty));
    }

    #[test]
    fn tree_regrows_after_merges() {
        let mut tree = small_tree();
        for k in 0..60 {
            tree.insert(k, k, false).unwrap();
        }
        for k in 0..50 {
            tree.remove(&k).unwrap();
        }
        let slots = tree.nodes.len();
        for k in 0..50 {
            tree.insert(k, k, false).unwrap();
        }
        tree.check_invariants();
        assert!(tree.nodes.len() > slots);
    }

    #[test]
    fn churn_without_slot_reuse_keeps_storage_bounded() {
        let mut tree = tree_with_degrees(4, 3, false);
        for round in 0..200 {
            for k in 0..40 {
                tree.insert(k, k, false).unwrap();
            }
            for k in 0..40 {
                tree.remove(&k).unwrap();
            }
            assert!(tree.is_empty());
            assert_eq!(tree.node_count(), 1, "round {round}");
            assert_eq!(tree.nodes.slot_count(), 0, "round {round}");
        }
        tree.check_invariants();
    }
}

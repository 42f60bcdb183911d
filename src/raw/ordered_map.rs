use core::borrow::Borrow;

use alloc::vec::Vec;

/// Result of searching for a key in a node.
pub(crate) enum SearchResult {
    /// Key was found at the given index.
    Found(usize),
    /// Key was not found; index is where it would be inserted.
    NotFound(usize),
}

/// Sorted map holding the entries of a single node.
///
/// Keys and values live in parallel vectors so that binary searches only touch keys. Positions are
/// plain indices; they stay valid until the next insertion or removal.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct OrderedMap<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
}

impl<K, V> OrderedMap<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> &V {
        &self.values[index]
    }

    #[inline]
    pub(crate) fn value_mut(&mut self, index: usize) -> &mut V {
        &mut self.values[index]
    }

    #[cfg(test)]
    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn values(&self) -> &[V] {
        &self.values
    }

    pub(crate) fn last_key(&self) -> Option<&K> {
        self.keys.last()
    }

    /// Replaces the value at `index`, returning the old one.
    pub(crate) fn replace_value(&mut self, index: usize, value: V) -> V {
        core::mem::replace(&mut self.values[index], value)
    }

    /// Removes the entry at `index`.
    pub(crate) fn remove_at(&mut self, index: usize) -> (K, V) {
        (self.keys.remove(index), self.values.remove(index))
    }

    pub(crate) fn pop_first(&mut self) -> Option<(K, V)> {
        if self.keys.is_empty() {
            None
        } else {
            Some(self.remove_at(0))
        }
    }

    pub(crate) fn pop_last(&mut self) -> Option<(K, V)> {
        let key = self.keys.pop()?;
        let value = self.values.pop()?;
        Some((key, value))
    }

    /// Splits off every entry from `at` onwards and returns them.
    pub(crate) fn trim(&mut self, at: usize) -> Self {
        Self {
            keys: self.keys.split_off(at),
            values: self.values.split_off(at),
        }
    }

    /// Takes ownership of all entries, in order.
    pub(crate) fn into_entries(self) -> impl DoubleEndedIterator<Item = (K, V)> {
        self.keys.into_iter().zip(self.values)
    }
}

impl<K: Ord, V> OrderedMap<K, V> {
    /// Builds a map from entries already sorted by strictly increasing key.
    pub(crate) fn from_sorted(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let (keys, values): (Vec<K>, Vec<V>) = entries.into_iter().unzip();
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]), "`OrderedMap::from_sorted()` - keys not sorted!");
        Self { keys, values }
    }

    #[inline]
    pub(crate) fn search<Q>(&self, key: &Q) -> SearchResult
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.keys.binary_search_by(|k| k.borrow().cmp(key)) {
            Ok(idx) => SearchResult::Found(idx),
            Err(idx) => SearchResult::NotFound(idx),
        }
    }

    /// Index of `key`, if present.
    pub(crate) fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.search(key) {
            SearchResult::Found(idx) => Some(idx),
            SearchResult::NotFound(_) => None,
        }
    }

    /// Index of the first key `>= key`; equals `len()` when every key is smaller.
    pub(crate) fn lower_bound<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.partition_point(|k| k.borrow() < key)
    }

    /// Inserts a new entry. Hands the entry back if the key is already present.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Result<usize, (K, V)> {
        match self.search(&key) {
            SearchResult::Found(_) => Err((key, value)),
            SearchResult::NotFound(idx) => {
                self.keys.insert(idx, key);
                self.values.insert(idx, value);
                Ok(idx)
            }
        }
    }

    /// Inserts or replaces an entry, returning the previous value.
    pub(crate) fn upsert(&mut self, key: K, value: V) -> Option<V> {
        match self.search(&key) {
            SearchResult::Found(idx) => Some(self.replace_value(idx, value)),
            SearchResult::NotFound(idx) => {
                self.keys.insert(idx, key);
                self.values.insert(idx, value);
                None
            }
        }
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let idx = self.find(key)?;
        Some(self.remove_at(idx))
    }

    /// Re-keys the entry stored under `old` without moving it.
    ///
    /// Returns `false` when `old` is absent. The new key must sort into the same position.
    pub(crate) fn replace_key<Q>(&mut self, old: &Q, new: K) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let Some(idx) = self.find(old) else {
            return false;
        };
        debug_assert!(
            (idx == 0 || self.keys[idx - 1] < new) && self.keys.get(idx + 1).is_none_or(|next| &new < next),
            "`OrderedMap::replace_key()` - new key changes the entry order!"
        );
        self.keys[idx] = new;
        true
    }

    /// Moves every entry of `other` into `self`. The key ranges must not overlap; `other` may sit
    /// entirely before or entirely after `self`.
    pub(crate) fn append_disjoint(&mut self, mut other: Self) {
        match (self.keys.last(), other.keys.first()) {
            (Some(last), Some(first)) if first <= last => {
                debug_assert!(
                    other.keys.last().is_some_and(|l| l < &self.keys[0]),
                    "`OrderedMap::append_disjoint()` - key ranges overlap!"
                );
                other.keys.append(&mut self.keys);
                other.values.append(&mut self.values);
                *self = other;
            }
            _ => {
                self.keys.append(&mut other.keys);
                self.values.append(&mut other.values);
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec;
    use pretty_assertions::assert_eq;

    fn map(keys: &[u32]) -> OrderedMap<u32, u32> {
        OrderedMap::from_sorted(keys.iter().map(|&k| (k, k * 10)))
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut m = map(&[1, 3]);
        assert_eq!(m.insert(2, 20), Ok(1));
        assert_eq!(m.insert(3, 99), Err((3, 99)));
        assert_eq!(m.keys(), &[1, 2, 3]);
        assert_eq!(m.values(), &[10, 20, 30]);
    }

    #[test]
    fn upsert_returns_previous() {
        let mut m = map(&[5]);
        assert_eq!(m.upsert(5, 1), Some(50));
        assert_eq!(m.upsert(6, 2), None);
        assert_eq!(m.values(), &[1, 2]);
    }

    #[test]
    fn lower_bound_positions() {
        let m = map(&[10, 20, 30]);
        assert_eq!(m.lower_bound(&5), 0);
        assert_eq!(m.lower_bound(&20), 1);
        assert_eq!(m.lower_bound(&21), 2);
        assert_eq!(m.lower_bound(&31), 3);
    }

    #[test]
    fn trim_keeps_head() {
        let mut m = map(&[1, 2, 3, 4, 5]);
        let tail = m.trim(2);
        assert_eq!(m.keys(), &[1, 2]);
        assert_eq!(tail.keys(), &[3, 4, 5]);
        assert_eq!(tail.values(), &[30, 40, 50]);
    }

    #[test]
    fn append_disjoint_either_side() {
        let mut low = map(&[1, 2]);
        low.append_disjoint(map(&[7, 8]));
        assert_eq!(low.keys(), &[1, 2, 7, 8]);

        let mut high = map(&[7, 8]);
        high.append_disjoint(map(&[1, 2]));
        assert_eq!(high.keys(), &[1, 2, 7, 8]);
        assert_eq!(high.values(), &[10, 20, 70, 80]);

        let mut empty = OrderedMap::new();
        empty.append_disjoint(map(&[3]));
        assert_eq!(empty.keys(), &[3]);
    }

    #[test]
    fn replace_key_in_place() {
        let mut m = map(&[1, 5, 9]);
        assert!(m.replace_key(&5, 7));
        assert!(!m.replace_key(&4, 6));
        assert_eq!(m.keys(), &[1, 7, 9]);
        assert_eq!(m.find(&7), Some(1));
        assert_eq!(*m.value(1), 50);
    }

    #[test]
    fn pops_and_removes() {
        let mut m = map(&[1, 2, 3]);
        assert_eq!(m.pop_first(), Some((1, 10)));
        assert_eq!(m.pop_last(), Some((3, 30)));
        assert_eq!(m.remove(&2), Some((2, 20)));
        assert_eq!(m.remove(&2), None);
        assert_eq!(m.len(), 0);
        assert_eq!(m.pop_last(), None);
        assert_eq!(m.into_entries().collect::<Vec<_>>(), vec![]);
    }
}

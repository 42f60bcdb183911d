use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;

use alloc::vec::Vec;

use crate::config::{MapConfig, SizeHints};
use crate::encoded_size::EncodedSize;
use crate::error::{MapError, Result, invariant_broken};
use crate::raw::{Degrees, LeafPos, RawMap};

mod cursor;

pub use cursor::Cursor;

/// An ordered map whose entries are spread over many size-bounded nodes.
///
/// `BigOrderedMap` is a [B+Tree]: values live only in leaves, leaves are chained in key order,
/// and every inner node keys its children by the largest key below them. Each node is kept under
/// [`MAX_NODE_BYTES`](crate::MAX_NODE_BYTES) when measured with [`EncodedSize`], so a single map
/// can grow without bound while every node stays small enough to be stored on its own.
///
/// Node degrees are either given explicitly through [`MapConfig`], derived from [`SizeHints`], or
/// derived automatically from the size of the keys and values. When both `K` and `V` have a
/// constant encoded size the degrees are fixed at construction and inserts skip size checks.
///
/// Positions inside the map are handed out as [`Cursor`]s. A cursor remembers the map's
/// modification count, so using it after the map changed fails with [`MapError::StaleCursor`]
/// instead of silently pointing somewhere else.
///
/// # Examples
///
/// ```
/// use big_ordered_map::{BigOrderedMap, MapError};
///
/// let mut balances: BigOrderedMap<u64, u64> = BigOrderedMap::new().unwrap();
///
/// balances.add(7, 100).unwrap();
/// balances.add(3, 250).unwrap();
/// assert_eq!(balances.add(7, 1), Err(MapError::KeyAlreadyExists));
///
/// // upsert replaces and hands back the old value.
/// assert_eq!(balances.upsert(7, 120).unwrap(), Some(100));
///
/// assert_eq!(balances.borrow(&7), Ok(&120));
/// assert_eq!(balances.remove(&3), Ok(250));
/// assert!(!balances.contains(&3));
///
/// for (account, balance) in &balances {
///     println!("{account}: {balance}");
/// }
/// ```
///
/// Walking the map with a cursor:
///
/// ```
/// use big_ordered_map::BigOrderedMap;
///
/// let map = BigOrderedMap::from_entries((0..10u32).map(|k| (k * 10, k))).unwrap();
///
/// let mut cursor = map.lower_bound(&35);
/// let mut seen = Vec::new();
/// while !cursor.is_end() {
///     seen.push(*cursor.key().unwrap());
///     cursor = cursor.next(&map).unwrap();
/// }
/// assert_eq!(seen, [40, 50, 60, 70, 80, 90]);
/// ```
///
/// [B+Tree]: https://en.wikipedia.org/wiki/B%2B_tree
#[derive(Clone)]
pub struct BigOrderedMap<K, V> {
    raw: RawMap<K, V>,
}

/// An iterator over the entries of a `BigOrderedMap`, in key order.
///
/// This `struct` is created by the [`iter`] method on [`BigOrderedMap`].
///
/// [`iter`]: BigOrderedMap::iter
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    raw: &'a RawMap<K, V>,
    front: Option<LeafPos>,
    back: Option<LeafPos>,
    remaining: usize,
}

/// An iterator over the keys of a `BigOrderedMap`.
///
/// This `struct` is created by the [`keys`] method on [`BigOrderedMap`].
///
/// [`keys`]: BigOrderedMap::keys
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

/// An iterator over the values of a `BigOrderedMap`.
///
/// This `struct` is created by the [`values`] method on [`BigOrderedMap`].
///
/// [`values`]: BigOrderedMap::values
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<K, V> BigOrderedMap<K, V> {
    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Maximum number of children of an inner node, or `0` while it is still undecided.
    #[must_use]
    pub const fn inner_max_degree(&self) -> usize {
        self.raw.degrees().inner()
    }

    /// Maximum number of entries of a leaf node, or `0` while it is still undecided.
    #[must_use]
    pub const fn leaf_max_degree(&self) -> usize {
        self.raw.degrees().leaf()
    }

    /// Returns `true` if keys and values have a constant encoded size.
    ///
    /// Only constant-size maps allow values to be mutated in place.
    #[must_use]
    pub const fn is_constant_size(&self) -> bool {
        self.raw.degrees().is_constant_size()
    }

    /// Number of node levels, leaves included. An empty map has height 1.
    #[must_use]
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Number of nodes currently allocated, the root included.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.raw.node_count()
    }

    /// Returns the first entry of the map.
    ///
    /// # Errors
    ///
    /// [`MapError::Empty`] if the map has no entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use big_ordered_map::{BigOrderedMap, MapError};
    ///
    /// let mut map: BigOrderedMap<u8, char> = BigOrderedMap::new().unwrap();
    /// assert_eq!(map.borrow_front(), Err(MapError::Empty));
    /// map.add(2, 'b').unwrap();
    /// map.add(1, 'a').unwrap();
    /// assert_eq!(map.borrow_front(), Ok((&1, &'a')));
    /// assert_eq!(map.borrow_back(), Ok((&2, &'b')));
    /// ```
    pub fn borrow_front(&self) -> Result<(&K, &V)> {
        let pos = self.raw.first_pos().ok_or(MapError::Empty)?;
        self.raw.entry_at(pos).ok_or_else(|| invariant_broken("leaf held an inner child"))
    }

    /// Returns the last entry of the map.
    ///
    /// # Errors
    ///
    /// [`MapError::Empty`] if the map has no entries.
    pub fn borrow_back(&self) -> Result<(&K, &V)> {
        let pos = self.raw.last_pos().ok_or(MapError::Empty)?;
        self.raw.entry_at(pos).ok_or_else(|| invariant_broken("leaf held an inner child"))
    }

    /// Gets an iterator over the entries of the map, sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use big_ordered_map::BigOrderedMap;
    ///
    /// let map = BigOrderedMap::from_entries([(3u16, 'c'), (1, 'a'), (2, 'b')]).unwrap();
    /// let mut iter = map.iter();
    /// assert_eq!(iter.next(), Some((&1, &'a')));
    /// assert_eq!(iter.next_back(), Some((&3, &'c')));
    /// assert_eq!(iter.len(), 1);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            raw: &self.raw,
            front: self.raw.first_pos(),
            back: self.raw.last_pos(),
            remaining: self.raw.len(),
        }
    }

    /// Gets an iterator over the keys of the map, in sorted order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Gets an iterator over the values of the map, in order by key.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Copies every entry out of the map, in key order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Returns the cursor positioned past the last entry.
    #[must_use]
    pub const fn end(&self) -> Cursor<K> {
        Cursor::end(self.raw.version())
    }

    /// Destroys a map that holds no entries.
    ///
    /// # Errors
    ///
    /// [`MapError::MapNotEmpty`] if entries remain. The map is dropped either way.
    pub fn destroy_empty(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(MapError::MapNotEmpty { len: self.len() })
        }
    }

    /// Destroys the map, handing every value to `f` in key order.
    ///
    /// # Examples
    ///
    /// ```
    /// use big_ordered_map::BigOrderedMap;
    ///
    /// let map = BigOrderedMap::from_entries([(2u8, 20u32), (1, 10)]).unwrap();
    /// let mut total = Vec::new();
    /// map.destroy(|v| total.push(v)).unwrap();
    /// assert_eq!(total, [10, 20]);
    /// ```
    ///
    /// # Errors
    ///
    /// [`MapError::InternalInvariant`] if the leaf chain does not account for every entry.
    pub fn destroy<F: FnMut(V)>(self, mut f: F) -> Result<()> {
        for (_, value) in self.raw.into_sorted_entries()? {
            f(value);
        }
        Ok(())
    }
}

impl<K, V> BigOrderedMap<K, V>
where
    K: Ord + Clone + EncodedSize,
    V: EncodedSize,
{
    /// Makes a new, empty map with automatically sized nodes.
    ///
    /// # Errors
    ///
    /// A capacity error if `K` and `V` have a constant encoded size that can never fit a node.
    ///
    /// # Examples
    ///
    /// ```
    /// use big_ordered_map::BigOrderedMap;
    ///
    /// let map: BigOrderedMap<u64, u64> = BigOrderedMap::new().unwrap();
    /// assert!(map.is_constant_size());
    /// assert_eq!(map.inner_max_degree(), 512);
    /// assert_eq!(map.leaf_max_degree(), 256);
    /// ```
    pub fn new() -> Result<Self> {
        Self::with_config(MapConfig::default())
    }

    /// Makes a new, empty map with the given node degrees.
    ///
    /// # Errors
    ///
    /// [`MapError::InvalidConfig`] for out-of-range degrees, or a capacity error for constant-size
    /// types that do not fit the configured degrees.
    pub fn with_config(config: MapConfig) -> Result<Self> {
        let degrees = Degrees::new::<K, V>(&config)?;
        Ok(Self {
            raw: RawMap::new(degrees, config.reuse_slots),
        })
    }

    /// Makes a new, empty map whose degrees are derived from expected entry sizes.
    ///
    /// # Errors
    ///
    /// [`MapError::InvalidConfig`] if the hints are inconsistent or the largest entry cannot fit
    /// a node of minimum degree.
    pub fn with_type_size_hints(hints: SizeHints) -> Result<Self> {
        Self::with_config(hints.to_config()?)
    }

    /// Builds a map from `entries`.
    ///
    /// # Errors
    ///
    /// The first error raised by [`add`](Self::add), including on duplicate keys.
    pub fn from_entries<I: IntoIterator<Item = (K, V)>>(entries: I) -> Result<Self> {
        let mut map = Self::new()?;
        map.add_all(entries)?;
        Ok(map)
    }

    /// Inserts a new entry.
    ///
    /// # Errors
    ///
    /// [`MapError::KeyAlreadyExists`] if `key` is present, or a capacity error if the entry is too
    /// large for a node. The map is unchanged in both cases.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        match self.raw.insert(key, value, false)? {
            None => Ok(()),
            Some(_) => Err(invariant_broken("non-overwriting insert replaced a value")),
        }
    }

    /// Inserts or replaces an entry, returning the previous value.
    ///
    /// # Errors
    ///
    /// A capacity error if the entry is too large for a node. The map is unchanged.
    pub fn upsert(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.raw.insert(key, value, true)
    }

    /// Adds every entry of `entries`, stopping at the first error.
    ///
    /// Entries added before the failing one stay in the map.
    ///
    /// # Errors
    ///
    /// As for [`add`](Self::add).
    pub fn add_all<I: IntoIterator<Item = (K, V)>>(&mut self, entries: I) -> Result<()> {
        for (key, value) in entries {
            self.add(key, value)?;
        }
        Ok(())
    }
}

impl<K: Ord + Clone, V> BigOrderedMap<K, V> {
    /// Removes `key` and returns its value.
    ///
    /// # Errors
    ///
    /// [`MapError::KeyNotFound`] if `key` is absent.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove<Q>(&mut self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove(key).map(|(_, value)| value)
    }

    /// Removes `key` if present.
    ///
    /// # Errors
    ///
    /// Only [`MapError::InternalInvariant`]; an absent key yields `Ok(None)`.
    pub fn remove_or_none<Q>(&mut self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.raw.remove(key) {
            Ok((_, value)) => Ok(Some(value)),
            Err(MapError::KeyNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Removes and returns the entry with the smallest key.
    ///
    /// # Errors
    ///
    /// [`MapError::Empty`] if the map has no entries.
    pub fn pop_front(&mut self) -> Result<(K, V)> {
        self.raw.pop_first()
    }

    /// Removes and returns the entry with the largest key.
    ///
    /// # Errors
    ///
    /// [`MapError::Empty`] if the map has no entries.
    pub fn pop_back(&mut self) -> Result<(K, V)> {
        self.raw.pop_last()
    }

    /// Returns `true` if the map holds `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.find(key).is_some()
    }

    /// Returns a reference to the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`MapError::KeyNotFound`] if `key` is absent.
    pub fn borrow<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get(key).ok_or(MapError::KeyNotFound)
    }

    /// Returns a reference to the value stored under `key`, or `None`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get(key)
    }

    /// Returns a mutable reference to the value stored under `key`.
    ///
    /// A value whose encoded size could change might push its leaf over the byte ceiling, so this
    /// is only offered for constant-size maps.
    ///
    /// # Errors
    ///
    /// [`MapError::BorrowMutRequiresConstantSize`] for variable-size maps, and
    /// [`MapError::KeyNotFound`] if `key` is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use big_ordered_map::{BigOrderedMap, MapError};
    ///
    /// let mut counters: BigOrderedMap<u32, u64> = BigOrderedMap::new().unwrap();
    /// counters.add(1, 0).unwrap();
    /// *counters.borrow_mut(&1).unwrap() += 5;
    /// assert_eq!(counters.get(&1), Some(&5));
    ///
    /// let mut names: BigOrderedMap<u32, String> = BigOrderedMap::new().unwrap();
    /// names.add(1, "x".to_string()).unwrap();
    /// assert_eq!(names.borrow_mut(&1), Err(MapError::BorrowMutRequiresConstantSize));
    /// ```
    pub fn borrow_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        if !self.is_constant_size() {
            return Err(MapError::BorrowMutRequiresConstantSize);
        }
        self.raw.get_mut(key).ok_or(MapError::KeyNotFound)
    }

    /// Returns the largest key strictly smaller than `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use big_ordered_map::BigOrderedMap;
    ///
    /// let map = BigOrderedMap::from_entries([(10u32, ()), (20, ()), (30, ())]).unwrap();
    /// assert_eq!(map.prev_key(&20), Some(&10));
    /// assert_eq!(map.prev_key(&25), Some(&20));
    /// assert_eq!(map.prev_key(&99), Some(&30));
    /// assert_eq!(map.prev_key(&10), None);
    /// assert_eq!(map.next_key(&20), Some(&30));
    /// assert_eq!(map.next_key(&5), Some(&10));
    /// assert_eq!(map.next_key(&30), None);
    /// ```
    pub fn prev_key<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let pos = match self.raw.lower_bound(key) {
            Some(pos) => self.raw.prev_pos(pos)?,
            None => self.raw.last_pos()?,
        };
        Some(self.raw.key_at(pos))
    }

    /// Returns the smallest key strictly larger than `key`.
    pub fn next_key<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut pos = self.raw.lower_bound(key)?;
        if self.raw.key_at(pos).borrow() == key {
            pos = self.raw.next_pos(pos)?;
        }
        Some(self.raw.key_at(pos))
    }

    /// Returns a cursor at the first entry whose key is `>= key`, or the end cursor.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor<K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.cursor_at(self.raw.lower_bound(key))
    }

    /// Returns a cursor at `key`, or the end cursor if `key` is absent.
    pub fn find<Q>(&self, key: &Q) -> Cursor<K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.cursor_at(self.raw.find(key))
    }

    /// Returns a cursor at the first entry, or the end cursor for an empty map.
    #[must_use]
    pub fn begin(&self) -> Cursor<K> {
        self.cursor_at(self.raw.first_pos())
    }

    fn cursor_at(&self, pos: Option<LeafPos>) -> Cursor<K> {
        match pos {
            Some(pos) => Cursor::at(self.raw.version(), pos, self.raw.key_at(pos).clone()),
            None => self.end(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BigOrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for BigOrderedMap<K, V> {
    fn eq(&self, other: &BigOrderedMap<K, V>) -> bool {
        self.len() == other.len() && self.iter().eq(other)
    }
}

impl<K: Eq, V: Eq> Eq for BigOrderedMap<K, V> {}

impl<'a, K, V> IntoIterator for &'a BigOrderedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K: 'a, V: 'a> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.front?;
        let entry = self.raw.entry_at(pos)?;
        self.remaining -= 1;
        self.front = self.raw.next_pos(pos);
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: 'a, V: 'a> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.back?;
        let entry = self.raw.entry_at(pos)?;
        self.remaining -= 1;
        self.back = self.raw.prev_pos(pos);
        Some(entry)
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            raw: self.raw,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
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

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Keys<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
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

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Values {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V: fmt::Debug> fmt::Debug for Values<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

use super::BigOrderedMap;
use crate::error::{MapError, Result, invariant_broken};
use crate::raw::{LeafPos, Version};

/// A position inside a [`BigOrderedMap`]: either an entry or the end of the map.
///
/// Cursors own a copy of the key they point at and nothing else, so they do not borrow the map.
/// Every operation takes the map explicitly and first checks that it has not been modified since
/// the cursor was created; a modified map, or a different map, fails the call with
/// [`MapError::StaleCursor`].
///
/// # Examples
///
/// ```
/// use big_ordered_map::{BigOrderedMap, MapError};
///
/// let mut map = BigOrderedMap::from_entries([(1u32, 'a'), (2, 'b'), (3, 'c')]).unwrap();
///
/// let end = map.end();
/// let last = end.prev(&map).unwrap();
/// assert_eq!(last.key(), Ok(&3));
/// assert_eq!(last.value(&map), Ok(&'c'));
/// assert!(last.next(&map).unwrap().is_end());
///
/// map.add(4, 'd').unwrap();
/// assert_eq!(last.value(&map), Err(MapError::StaleCursor));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cursor<K> {
    version: Version,
    position: Position<K>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Position<K> {
    End,
    At { pos: LeafPos, key: K },
}

impl<K> Cursor<K> {
    pub(crate) const fn end(version: Version) -> Self {
        Self {
            version,
            position: Position::End,
        }
    }

    pub(crate) const fn at(version: Version, pos: LeafPos, key: K) -> Self {
        Self {
            version,
            position: Position::At { pos, key },
        }
    }

    /// Returns `true` if the cursor is past the last entry.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self.position, Position::End)
    }

    /// Key of the entry under the cursor.
    ///
    /// # Errors
    ///
    /// [`MapError::IterOutOfBounds`] for the end cursor.
    pub fn key(&self) -> Result<&K> {
        match &self.position {
            Position::At { key, .. } => Ok(key),
            Position::End => Err(MapError::IterOutOfBounds),
        }
    }

    /// Returns `true` if the cursor is at the first entry, or at the end of an empty map.
    ///
    /// # Errors
    ///
    /// [`MapError::StaleCursor`] if `map` changed since the cursor was created.
    pub fn is_begin<V>(&self, map: &BigOrderedMap<K, V>) -> Result<bool> {
        self.check(map)?;
        Ok(match &self.position {
            Position::End => map.is_empty(),
            Position::At { pos, .. } => map.raw.is_first_pos(*pos),
        })
    }

    /// Value of the entry under the cursor.
    ///
    /// # Errors
    ///
    /// [`MapError::StaleCursor`] if `map` changed, or [`MapError::IterOutOfBounds`] for the end
    /// cursor.
    pub fn value<'m, V>(&self, map: &'m BigOrderedMap<K, V>) -> Result<&'m V> {
        let pos = self.checked_pos(map)?;
        map.raw
            .entry_at(pos)
            .map(|(_, value)| value)
            .ok_or_else(|| invariant_broken("cursor points at an inner child"))
    }

    /// Mutable value of the entry under the cursor. Mutating a value does not invalidate cursors.
    ///
    /// # Errors
    ///
    /// As for [`value`](Self::value), plus [`MapError::BorrowMutRequiresConstantSize`] for maps
    /// whose keys or values vary in size.
    pub fn value_mut<'m, V>(&self, map: &'m mut BigOrderedMap<K, V>) -> Result<&'m mut V> {
        if !map.is_constant_size() {
            return Err(MapError::BorrowMutRequiresConstantSize);
        }
        let pos = self.checked_pos(map)?;
        map.raw
            .value_at_mut(pos)
            .ok_or_else(|| invariant_broken("cursor points at an inner child"))
    }

    fn check<V>(&self, map: &BigOrderedMap<K, V>) -> Result<()> {
        if self.version == map.raw.version() {
            Ok(())
        } else {
            Err(MapError::StaleCursor)
        }
    }

    fn checked_pos<V>(&self, map: &BigOrderedMap<K, V>) -> Result<LeafPos> {
        self.check(map)?;
        match &self.position {
            Position::At { pos, .. } => Ok(*pos),
            Position::End => Err(MapError::IterOutOfBounds),
        }
    }
}

impl<K: Clone> Cursor<K> {
    /// Returns the cursor one entry further. Stepping off the last entry yields the end cursor.
    ///
    /// # Errors
    ///
    /// [`MapError::StaleCursor`] if `map` changed, or [`MapError::IterOutOfBounds`] when called on
    /// the end cursor.
    #[allow(clippy::should_implement_trait)]
    pub fn next<V>(&self, map: &BigOrderedMap<K, V>) -> Result<Self> {
        let pos = self.checked_pos(map)?;
        Ok(self.moved_to(map, map.raw.next_pos(pos)))
    }

    /// Returns the cursor one entry back. Stepping back from the end cursor yields the last entry.
    ///
    /// # Errors
    ///
    /// [`MapError::StaleCursor`] if `map` changed, or [`MapError::IterOutOfBounds`] when called on
    /// the first entry or on the end cursor of an empty map.
    pub fn prev<V>(&self, map: &BigOrderedMap<K, V>) -> Result<Self> {
        self.check(map)?;
        let prev = match &self.position {
            Position::End => map.raw.last_pos(),
            Position::At { pos, .. } => map.raw.prev_pos(*pos),
        };
        match prev {
            Some(pos) => Ok(self.moved_to(map, Some(pos))),
            None => Err(MapError::IterOutOfBounds),
        }
    }

    fn moved_to<V>(&self, map: &BigOrderedMap<K, V>, pos: Option<LeafPos>) -> Self {
        match pos {
            Some(pos) => Self::at(self.version, pos, map.raw.key_at(pos).clone()),
            None => Self::end(self.version),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;

    fn map_with(keys: impl IntoIterator<Item = u32>) -> BigOrderedMap<u32, u32> {
        let mut map = BigOrderedMap::with_config(MapConfig {
            inner_max_degree: 4,
            leaf_max_degree: 3,
            reuse_slots: false,
        })
        .unwrap();
        map.add_all(keys.into_iter().map(|k| (k, k + 100))).unwrap();
        map
    }

    #[test]
    fn empty_map_cursors() {
        let map = map_with([]);
        let begin = map.begin();
        assert!(begin.is_end());
        assert_eq!(begin, map.end());
        assert_eq!(begin.is_begin(&map), Ok(true));
        assert_eq!(begin.next(&map), Err(MapError::IterOutOfBounds));
        assert_eq!(begin.prev(&map), Err(MapError::IterOutOfBounds));
        assert_eq!(begin.key(), Err(MapError::IterOutOfBounds));
        assert_eq!(begin.value(&map), Err(MapError::IterOutOfBounds));
    }

    #[test]
    fn forward_walk_crosses_leaves() {
        let map = map_with((0..30).map(|k| k * 2));
        let mut cursor = map.begin();
        assert_eq!(cursor.is_begin(&map), Ok(true));
        let mut keys = Vec::new();
        while !cursor.is_end() {
            keys.push(*cursor.key().unwrap());
            assert_eq!(cursor.value(&map), Ok(&(keys[keys.len() - 1] + 100)));
            cursor = cursor.next(&map).unwrap();
        }
        assert_eq!(keys, (0..30).map(|k| k * 2).collect::<Vec<_>>());
        assert_eq!(cursor.next(&map), Err(MapError::IterOutOfBounds));
    }

    #[test]
    fn backward_walk_from_end() {
        let map = map_with(0..25);
        let mut cursor = map.end();
        let mut keys = Vec::new();
        while let Ok(prev) = cursor.prev(&map) {
            keys.push(*prev.key().unwrap());
            cursor = prev;
        }
        assert_eq!(cursor.is_begin(&map), Ok(true));
        keys.reverse();
        assert_eq!(keys, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn find_and_lower_bound() {
        let map = map_with((0..20).map(|k| k * 10));
        assert_eq!(map.find(&70).key(), Ok(&70));
        assert!(map.find(&75).is_end());
        assert_eq!(map.lower_bound(&75).key(), Ok(&80));
        assert!(map.lower_bound(&191).is_end());
        assert_eq!(map.lower_bound(&0).is_begin(&map), Ok(true));
        assert_eq!(map.lower_bound(&1).is_begin(&map), Ok(false));
    }

    #[test]
    fn mutation_invalidates_but_value_mut_does_not() {
        let mut map = map_with(0..10);
        let cursor = map.find(&4);
        *cursor.value_mut(&mut map).unwrap() = 7;
        assert_eq!(cursor.value(&map), Ok(&7));

        map.remove(&9).unwrap();
        assert_eq!(cursor.value(&map), Err(MapError::StaleCursor));
        assert_eq!(cursor.next(&map), Err(MapError::StaleCursor));
        assert_eq!(cursor.is_begin(&map), Err(MapError::StaleCursor));
        assert_eq!(map.find(&4).value(&map), Ok(&7));
    }

    #[test]
    fn cursor_from_another_map_is_rejected() {
        let big = map_with(0..40);
        let small = map_with([]);
        let copy = big.clone();

        let last = big.find(&39);
        assert_eq!(last.value(&big), Ok(&139));
        assert_eq!(last.value(&small), Err(MapError::StaleCursor));
        assert_eq!(last.next(&small), Err(MapError::StaleCursor));
        assert_eq!(small.end().prev(&big), Err(MapError::StaleCursor));

        assert_eq!(copy, big);
        assert_eq!(last.value(&copy), Err(MapError::StaleCursor));
        assert_eq!(copy.find(&39).value(&copy), Ok(&139));
        assert_ne!(copy.begin(), big.begin());
    }

    #[test]
    fn failed_mutation_keeps_cursors_valid() {
        let mut map = map_with(0..10);
        let cursor = map.find(&3);
        assert_eq!(map.add(3, 0), Err(MapError::KeyAlreadyExists));
        assert_eq!(map.remove(&42), Err(MapError::KeyNotFound));
        assert_eq!(cursor.value(&map), Ok(&103));
    }
}

//! Node sizing parameters.

use crate::error::{MapError, Result};

/// Hard byte ceiling of a single node.
pub const MAX_NODE_BYTES: usize = 409_600;
/// Byte size a node is aimed at when the degree is derived automatically.
pub const DEFAULT_TARGET_NODE_SIZE: usize = 4_096;
/// Smallest permitted inner node degree.
pub const INNER_MIN_DEGREE: u16 = 4;
/// Smallest permitted leaf node degree.
pub const LEAF_MIN_DEGREE: u16 = 3;
/// Largest permitted degree of any node.
pub const MAX_DEGREE: u16 = 4_096;

/// Construction parameters for a [`BigOrderedMap`](crate::BigOrderedMap).
///
/// A degree of `0` means "derive it from the size of the first entry". An explicit degree must lie
/// within `INNER_MIN_DEGREE..=MAX_DEGREE` (inner) or `LEAF_MIN_DEGREE..=MAX_DEGREE` (leaf).
///
/// # Examples
///
/// ```
/// use big_ordered_map::{BigOrderedMap, MapConfig};
///
/// let config = MapConfig { inner_max_degree: 4, leaf_max_degree: 3, ..MapConfig::default() };
/// let mut map: BigOrderedMap<u64, u64> = BigOrderedMap::with_config(config).unwrap();
/// map.add(1, 10).unwrap();
/// assert_eq!(map.leaf_max_degree(), 3);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MapConfig {
    /// Maximum number of children of an inner node, or `0` for automatic.
    pub inner_max_degree: u16,
    /// Maximum number of entries of a leaf node, or `0` for automatic.
    pub leaf_max_degree: u16,
    /// Whether slots freed by merges are handed out again by later splits.
    ///
    /// When `false`, every split gets a handle not currently in use and freed slots release their
    /// storage; handles only repeat once the handle space has wrapped around.
    pub reuse_slots: bool,
}

impl MapConfig {
    /// Checks that explicit degrees lie in their permitted ranges.
    pub fn validate(&self) -> Result<()> {
        if self.inner_max_degree != 0 && !(INNER_MIN_DEGREE..=MAX_DEGREE).contains(&self.inner_max_degree) {
            return Err(MapError::InvalidConfig("inner_max_degree out of range"));
        }
        if self.leaf_max_degree != 0 && !(LEAF_MIN_DEGREE..=MAX_DEGREE).contains(&self.leaf_max_degree) {
            return Err(MapError::InvalidConfig("leaf_max_degree out of range"));
        }
        Ok(())
    }
}

/// Expected key and value sizes, used to pick node degrees up front.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeHints {
    /// Typical encoded key size.
    pub avg_key_bytes: usize,
    /// Largest encoded key that will ever be inserted.
    pub max_key_bytes: usize,
    /// Typical encoded value size.
    pub avg_value_bytes: usize,
    /// Largest encoded value that will ever be inserted.
    pub max_value_bytes: usize,
}

impl SizeHints {
    /// Derives a [`MapConfig`] whose nodes aim at the target size for average entries while still
    /// fitting the byte ceiling for the largest ones.
    ///
    /// # Examples
    ///
    /// ```
    /// use big_ordered_map::SizeHints;
    ///
    /// let hints = SizeHints { avg_key_bytes: 8, max_key_bytes: 8, avg_value_bytes: 100, max_value_bytes: 2_000 };
    /// let config = hints.to_config().unwrap();
    /// assert_eq!(config.inner_max_degree, 512);
    /// assert_eq!(config.leaf_max_degree, 37);
    /// ```
    pub fn to_config(&self) -> Result<MapConfig> {
        if self.avg_key_bytes > self.max_key_bytes {
            return Err(MapError::InvalidConfig("avg_key_bytes exceeds max_key_bytes"));
        }
        if self.avg_value_bytes > self.max_value_bytes {
            return Err(MapError::InvalidConfig("avg_value_bytes exceeds max_value_bytes"));
        }

        let inner_from_avg = auto_degree(self.avg_key_bytes, INNER_MIN_DEGREE);
        let inner_from_max = MAX_NODE_BYTES / self.max_key_bytes.max(1);
        if inner_from_max < usize::from(INNER_MIN_DEGREE) {
            return Err(MapError::InvalidConfig("max_key_bytes too large for minimum inner degree"));
        }

        let avg_entry = self.avg_key_bytes + self.avg_value_bytes;
        let max_entry = self.max_key_bytes + self.max_value_bytes;
        let leaf_from_avg = auto_degree(avg_entry, LEAF_MIN_DEGREE);
        let leaf_from_max = MAX_NODE_BYTES / max_entry.max(1);
        if leaf_from_max < usize::from(LEAF_MIN_DEGREE) {
            return Err(MapError::InvalidConfig("max entry size too large for minimum leaf degree"));
        }

        Ok(MapConfig {
            inner_max_degree: clamp_degree(usize::from(inner_from_avg).min(inner_from_max)),
            leaf_max_degree: clamp_degree(usize::from(leaf_from_avg).min(leaf_from_max)),
            reuse_slots: false,
        })
    }
}

/// Degree that puts `entry_bytes * degree` near [`DEFAULT_TARGET_NODE_SIZE`], clamped to
/// `min_degree..=MAX_DEGREE`.
pub(crate) fn auto_degree(entry_bytes: usize, min_degree: u16) -> u16 {
    let ideal = DEFAULT_TARGET_NODE_SIZE / entry_bytes.max(1);
    clamp_degree(ideal).max(min_degree)
}

fn clamp_degree(degree: usize) -> u16 {
    // MAX_DEGREE fits u16, so the narrowing below cannot truncate.
    #[allow(clippy::cast_possible_truncation)]
    let degree = degree.min(usize::from(MAX_DEGREE)) as u16;
    degree
}

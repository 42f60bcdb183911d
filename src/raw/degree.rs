use crate::config::{INNER_MIN_DEGREE, LEAF_MIN_DEGREE, MAX_NODE_BYTES, MapConfig, auto_degree};
use crate::encoded_size::EncodedSize;
use crate::error::{MapError, Result};

/// Maximum fan-out of inner and leaf nodes, plus the byte-ceiling checks that keep every node
/// below [`MAX_NODE_BYTES`].
///
/// A degree of `0` is still undecided; it is derived from the first entry that gets validated.
/// When both key and value types have a constant encoded size the degrees are fixed at
/// construction and per-entry validation is skipped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Degrees {
    inner: u16,
    leaf: u16,
    constant_size: bool,
}

impl Degrees {
    pub(crate) fn new<K: EncodedSize, V: EncodedSize>(config: &MapConfig) -> Result<Self> {
        config.validate()?;
        let degrees = Self {
            inner: config.inner_max_degree,
            leaf: config.leaf_max_degree,
            constant_size: false,
        };

        let (Some(key_bytes), Some(value_bytes)) = (K::CONSTANT_SIZE, V::CONSTANT_SIZE) else {
            return Ok(degrees);
        };

        let entry_bytes = key_bytes + value_bytes;
        let degrees = degrees.initialized(key_bytes, entry_bytes);
        degrees.check(key_bytes, entry_bytes)?;
        tracing::debug!(
            target: "big_ordered_map::degree",
            inner = degrees.inner,
            leaf = degrees.leaf,
            key_bytes,
            entry_bytes,
            "constant-size degrees fixed"
        );
        Ok(Self {
            constant_size: true,
            ..degrees
        })
    }

    #[inline]
    pub(crate) const fn inner(&self) -> usize {
        self.inner as usize
    }

    #[inline]
    pub(crate) const fn leaf(&self) -> usize {
        self.leaf as usize
    }

    #[inline]
    pub(crate) const fn max_degree(&self, is_leaf: bool) -> usize {
        if is_leaf { self.leaf() } else { self.inner() }
    }

    #[inline]
    pub(crate) const fn is_constant_size(&self) -> bool {
        self.constant_size
    }

    /// Checks that `key`/`value` fit a node at the current degrees, deciding any undecided degree
    /// from their sizes first. Nothing changes when the check fails.
    pub(crate) fn validate_entry<K, V>(&mut self, key: &K, value: &V) -> Result<()>
    where
        K: EncodedSize + ?Sized,
        V: EncodedSize + ?Sized,
    {
        if self.constant_size {
            return Ok(());
        }

        let key_bytes = key.encoded_size();
        let entry_bytes = key_bytes + value.encoded_size();
        let candidate = self.initialized(key_bytes, entry_bytes);
        candidate.check(key_bytes, entry_bytes)?;

        if candidate != *self {
            tracing::debug!(
                target: "big_ordered_map::degree",
                inner = candidate.inner,
                leaf = candidate.leaf,
                key_bytes,
                entry_bytes,
                "degrees derived from first entry"
            );
            *self = candidate;
        }
        Ok(())
    }

    fn initialized(self, key_bytes: usize, entry_bytes: usize) -> Self {
        Self {
            inner: if self.inner == 0 {
                auto_degree(key_bytes, INNER_MIN_DEGREE)
            } else {
                self.inner
            },
            leaf: if self.leaf == 0 {
                auto_degree(entry_bytes, LEAF_MIN_DEGREE)
            } else {
                self.leaf
            },
            constant_size: self.constant_size,
        }
    }

    fn check(&self, key_bytes: usize, entry_bytes: usize) -> Result<()> {
        if key_bytes.saturating_mul(self.inner()) > MAX_NODE_BYTES {
            return Err(MapError::KeyBytesTooLarge {
                size: key_bytes,
                degree: self.inner(),
                limit: MAX_NODE_BYTES,
            });
        }
        if entry_bytes.saturating_mul(self.leaf()) > MAX_NODE_BYTES {
            return Err(MapError::EntryBytesTooLarge {
                size: entry_bytes,
                degree: self.leaf(),
                limit: MAX_NODE_BYTES,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::MAX_DEGREE;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;

    #[test]
    fn constant_size_types_fix_degrees_up_front() {
        let degrees = Degrees::new::<u64, u64>(&MapConfig::default()).unwrap();
        assert!(degrees.is_constant_size());
        assert_eq!(degrees.inner(), 512);
        assert_eq!(degrees.leaf(), 256);
    }

    #[test]
    fn variable_size_types_defer_degrees() {
        let mut degrees = Degrees::new::<String, Vec<u8>>(&MapConfig::default()).unwrap();
        assert!(!degrees.is_constant_size());
        assert_eq!(degrees.inner(), 0);

        degrees.validate_entry(&String::from("abcdefg"), &vec![0u8; 119]).unwrap();
        assert_eq!(degrees.inner(), 512);
        assert_eq!(degrees.leaf(), 32);

        // Later entries never change the degrees, only get checked against them.
        degrees.validate_entry(&String::from("a"), &Vec::<u8>::new()).unwrap();
        assert_eq!(degrees.leaf(), 32);
    }

    #[test]
    fn oversized_entry_is_rejected_without_side_effects() {
        let config = MapConfig {
            leaf_max_degree: 8,
            ..MapConfig::default()
        };
        let mut degrees = Degrees::new::<u8, Vec<u8>>(&config).unwrap();
        let before = degrees;
        let err = degrees.validate_entry(&1u8, &vec![0u8; 60_000]).unwrap_err();
        assert_eq!(
            err,
            MapError::EntryBytesTooLarge {
                size: 1 + 3 + 60_000,
                degree: 8,
                limit: MAX_NODE_BYTES,
            }
        );
        assert_eq!(degrees, before);
    }

    #[test]
    fn oversized_key_is_rejected() {
        let config = MapConfig {
            inner_max_degree: MAX_DEGREE,
            leaf_max_degree: 3,
            reuse_slots: false,
        };
        let mut degrees = Degrees::new::<Vec<u8>, u8>(&config).unwrap();
        let err = degrees.validate_entry(&vec![0u8; 200], &0u8).unwrap_err();
        assert!(matches!(err, MapError::KeyBytesTooLarge { degree: 4_096, .. }));
    }

    #[test]
    fn constant_size_that_cannot_fit_fails_construction() {
        let config = MapConfig {
            leaf_max_degree: MAX_DEGREE,
            ..MapConfig::default()
        };
        let err = Degrees::new::<u64, [u64; 32]>(&config).unwrap_err();
        assert!(matches!(err, MapError::EntryBytesTooLarge { .. }));
    }
}

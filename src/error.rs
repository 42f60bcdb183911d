use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, MapError>;

/// Errors returned by [`BigOrderedMap`](crate::BigOrderedMap) and its cursors.
///
/// Capacity errors are raised before the map is touched, so the map is left exactly as it was.
/// [`MapError::InternalInvariant`] means the tree structure itself is inconsistent and should be
/// treated as fatal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MapError {
    /// A non-overwriting insert found the key already present.
    #[error("key already exists")]
    KeyAlreadyExists,
    /// The key is not present in the map.
    #[error("key not found")]
    KeyNotFound,
    /// `destroy_empty` was called on a map that still holds entries.
    #[error("map is not empty ({len} entries remain)")]
    MapNotEmpty {
        /// Number of entries still stored.
        len: usize,
    },
    /// `pop_front`/`pop_back`/`borrow_front`/`borrow_back` on an empty map.
    #[error("map is empty")]
    Empty,
    /// A cursor was stepped past either end of the map.
    #[error("cursor out of bounds")]
    IterOutOfBounds,
    /// A cursor was used after the map it was created from was modified, or with another map.
    #[error("cursor used after the map was modified or with another map")]
    StaleCursor,
    /// A single key does not fit an inner node at the configured degree.
    #[error("key of {size} bytes exceeds node limit of {limit} bytes at inner degree {degree}")]
    KeyBytesTooLarge {
        /// Encoded key size.
        size: usize,
        /// Inner node max degree.
        degree: usize,
        /// Byte ceiling of a node.
        limit: usize,
    },
    /// A single key/value pair does not fit a leaf node at the configured degree.
    #[error("entry of {size} bytes exceeds node limit of {limit} bytes at leaf degree {degree}")]
    EntryBytesTooLarge {
        /// Encoded key plus value size.
        size: usize,
        /// Leaf node max degree.
        degree: usize,
        /// Byte ceiling of a node.
        limit: usize,
    },
    /// A configuration parameter or size hint is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// In-place mutation of values is only allowed when keys and values have a constant size.
    #[error("mutable borrow requires constant-size keys and values")]
    BorrowMutRequiresConstantSize,
    /// The tree violated one of its own structural invariants.
    #[error("internal invariant broken: {0}")]
    InternalInvariant(&'static str),
}

/// Logs and builds an [`MapError::InternalInvariant`].
#[cold]
pub(crate) fn invariant_broken(what: &'static str) -> MapError {
    tracing::error!(target: "big_ordered_map", invariant = what, "internal invariant broken");
    MapError::InternalInvariant(what)
}

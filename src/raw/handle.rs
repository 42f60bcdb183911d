use core::fmt;
use core::num::NonZero;

#[cfg(test)]
type RawHandle = u16;
#[cfg(not(test))]
type RawHandle = u32;

/// Stable address of a node.
///
/// Arena slots are addressed by `index + 1` so that `Option<Handle>` (the leaf chain link) costs no
/// extra space. The largest raw value is reserved for [`Handle::ROOT`], the inline root node, and
/// is never handed out by the arena.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(transparent)]
pub(crate) struct Handle(NonZero<RawHandle>);

impl Handle {
    /// Largest slot index the arena may issue.
    pub(crate) const MAX: usize = (RawHandle::MAX - 2) as usize;

    /// The node stored inline in the map rather than in the arena.
    pub(crate) const ROOT: Self = Self(NonZero::new(RawHandle::MAX).unwrap());

    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        assert!(index <= Self::MAX, "`Handle::from_index()` - `index` > `Handle::MAX`!");
        #[allow(clippy::cast_possible_truncation)]
        Self(NonZero::new((index + 1) as RawHandle).unwrap())
    }

    /// Slot index of an arena handle.
    ///
    /// Must not be called on [`Handle::ROOT`].
    #[inline]
    pub(crate) const fn to_index(self) -> usize {
        debug_assert!(!self.is_root(), "`Handle::to_index()` - the root has no slot index!");
        (self.0.get() - 1) as usize
    }

    #[inline]
    pub(crate) const fn is_root(self) -> bool {
        self.0.get() == RawHandle::MAX
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("Handle(ROOT)")
        } else {
            write!(f, "Handle({})", self.to_index())
        }
    }
}

//! Byte-size estimation for keys and values.
//!
//! Node capacity is bounded in bytes, so every key and value stored in a
//! [`BigOrderedMap`](crate::BigOrderedMap) must report how large its encoded form is. Sizes follow
//! a compact canonical layout: fixed-width integers, one byte for `bool`, and a ULEB128 length
//! prefix in front of variable-length sequences.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

/// Reports the encoded byte size of a value.
///
/// Types whose encoding always has the same length set [`CONSTANT_SIZE`](Self::CONSTANT_SIZE).
/// A map whose key and value types are both constant-size validates node capacity once, at
/// construction, and then skips per-insert size checks.
///
/// # Examples
///
/// ```
/// use big_ordered_map::EncodedSize;
///
/// assert_eq!(7u64.encoded_size(), 8);
/// assert_eq!(u64::CONSTANT_SIZE, Some(8));
/// assert_eq!(String::from("abc").encoded_size(), 4);
/// assert_eq!(String::CONSTANT_SIZE, None);
/// ```
pub trait EncodedSize {
    /// The encoded size shared by every value of this type, if there is one.
    const CONSTANT_SIZE: Option<usize> = None;

    /// Returns the number of bytes this value occupies once encoded.
    fn encoded_size(&self) -> usize;
}

/// Number of bytes in the ULEB128 encoding of `len`.
pub(crate) const fn uleb128_len(mut len: usize) -> usize {
    let mut bytes = 1;
    while len >= 0x80 {
        len >>= 7;
        bytes += 1;
    }
    bytes
}

macro_rules! fixed_width {
    ($($ty:ty),* $(,)?) => {
        $(
            impl EncodedSize for $ty {
                const CONSTANT_SIZE: Option<usize> = Some(core::mem::size_of::<$ty>());

                #[inline]
                fn encoded_size(&self) -> usize {
                    core::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

fixed_width!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, char);

impl EncodedSize for bool {
    const CONSTANT_SIZE: Option<usize> = Some(1);

    fn encoded_size(&self) -> usize {
        1
    }
}

impl EncodedSize for () {
    const CONSTANT_SIZE: Option<usize> = Some(0);

    fn encoded_size(&self) -> usize {
        0
    }
}

impl EncodedSize for str {
    fn encoded_size(&self) -> usize {
        uleb128_len(self.len()) + self.len()
    }
}

impl EncodedSize for String {
    fn encoded_size(&self) -> usize {
        self.as_str().encoded_size()
    }
}

impl<T: EncodedSize> EncodedSize for [T] {
    fn encoded_size(&self) -> usize {
        let body: usize = match T::CONSTANT_SIZE {
            Some(size) => size * self.len(),
            None => self.iter().map(EncodedSize::encoded_size).sum(),
        };
        uleb128_len(self.len()) + body
    }
}

impl<T: EncodedSize> EncodedSize for Vec<T> {
    fn encoded_size(&self) -> usize {
        self.as_slice().encoded_size()
    }
}

impl<T: EncodedSize, const N: usize> EncodedSize for [T; N] {
    const CONSTANT_SIZE: Option<usize> = match T::CONSTANT_SIZE {
        Some(size) => Some(size * N),
        None => None,
    };

    fn encoded_size(&self) -> usize {
        self.iter().map(EncodedSize::encoded_size).sum()
    }
}

impl<T: EncodedSize> EncodedSize for Option<T> {
    fn encoded_size(&self) -> usize {
        1 + self.as_ref().map_or(0, EncodedSize::encoded_size)
    }
}

impl<T: EncodedSize + ?Sized> EncodedSize for Box<T> {
    const CONSTANT_SIZE: Option<usize> = T::CONSTANT_SIZE;

    fn encoded_size(&self) -> usize {
        (**self).encoded_size()
    }
}

impl<T: EncodedSize + ?Sized> EncodedSize for &T {
    const CONSTANT_SIZE: Option<usize> = T::CONSTANT_SIZE;

    fn encoded_size(&self) -> usize {
        (**self).encoded_size()
    }
}

impl<A: EncodedSize, B: EncodedSize> EncodedSize for (A, B) {
    const CONSTANT_SIZE: Option<usize> = match (A::CONSTANT_SIZE, B::CONSTANT_SIZE) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    };

    fn encoded_size(&self) -> usize {
        self.0.encoded_size() + self.1.encoded_size()
    }
}

impl<A: EncodedSize, B: EncodedSize, C: EncodedSize> EncodedSize for (A, B, C) {
    const CONSTANT_SIZE: Option<usize> = match (A::CONSTANT_SIZE, B::CONSTANT_SIZE, C::CONSTANT_SIZE) {
        (Some(a), Some(b), Some(c)) => Some(a + b + c),
        _ => None,
    };

    fn encoded_size(&self) -> usize {
        self.0.encoded_size() + self.1.encoded_size() + self.2.encoded_size()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec;
    use proptest::prelude::*;

    #[test]
    fn uleb128_boundaries() {
        assert_eq!(uleb128_len(0), 1);
        assert_eq!(uleb128_len(0x7f), 1);
        assert_eq!(uleb128_len(0x80), 2);
        assert_eq!(uleb128_len(0x3fff), 2);
        assert_eq!(uleb128_len(0x4000), 3);
    }

    #[test]
    fn composite_constant_sizes() {
        assert_eq!(<(u32, u64)>::CONSTANT_SIZE, Some(12));
        assert_eq!(<[u16; 5]>::CONSTANT_SIZE, Some(10));
        assert_eq!(<(u32, String)>::CONSTANT_SIZE, None);
        assert_eq!(<Option<u8>>::CONSTANT_SIZE, None);
    }

    #[test]
    fn variable_sizes() {
        assert_eq!(vec![1u32, 2, 3].encoded_size(), 1 + 12);
        assert_eq!(Some(5u64).encoded_size(), 9);
        assert_eq!(None::<u64>.encoded_size(), 1);
        assert_eq!(vec![String::from("ab"), String::new()].encoded_size(), 1 + 3 + 1);
    }

    proptest! {
        #[test]
        fn string_size_is_prefix_plus_bytes(s in ".{0,300}") {
            prop_assert_eq!(s.encoded_size(), uleb128_len(s.len()) + s.len());
        }

        #[test]
        fn byte_vector_size(bytes in prop::collection::vec(any::<u8>(), 0..1000)) {
            prop_assert_eq!(bytes.encoded_size(), uleb128_len(bytes.len()) + bytes.len());
        }
    }
}

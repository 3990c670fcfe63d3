//! Aligned inline buffer types.
//!
//! Each type `AN<SIZE>` is a `SIZE`-byte region aligned to `N` bytes, meant
//! to be used as [`StoragePolicy::Buffer`](crate::policy::StoragePolicy::Buffer).
//! `SIZE` should be a multiple of `N`; otherwise the type is padded up to the
//! next multiple and the extra bytes become usable capacity.

macro_rules! aligned_spaces {
    ($($(#[$attr:meta])* $name:ident => $align:literal),* $(,)?) => {
        $(
            $(#[$attr])*
            #[derive(Copy, Clone)]
            #[repr(C, align($align))]
            pub struct $name<const SIZE: usize>(
                #[allow(dead_code, reason = "only the layout of a space is used")] [u8; SIZE],
            );
        )*
    };
}

aligned_spaces! {
    /// `SIZE` bytes with an alignment of 1.
    A1 => 1,
    /// `SIZE` bytes with an alignment of 2.
    A2 => 2,
    /// `SIZE` bytes with an alignment of 4.
    A4 => 4,
    /// `SIZE` bytes with an alignment of 8.
    A8 => 8,
    /// `SIZE` bytes with an alignment of 16.
    A16 => 16,
    /// `SIZE` bytes with an alignment of 32.
    A32 => 32,
    /// `SIZE` bytes with an alignment of 64.
    A64 => 64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_layouts() {
        assert_eq!(size_of::<A1<3>>(), 3);
        assert_eq!(align_of::<A1<3>>(), 1);
        assert_eq!(size_of::<A8<16>>(), 16);
        assert_eq!(align_of::<A8<16>>(), 8);
        assert_eq!(size_of::<A64<64>>(), 64);
        assert_eq!(align_of::<A64<64>>(), 64);
    }

    #[test]
    fn test_space_padding() {
        // Rounded up to the alignment.
        assert_eq!(size_of::<A8<20>>(), 24);
        assert_eq!(size_of::<A16<0>>(), 0);
    }
}

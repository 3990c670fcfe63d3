//! The inline slot and the placement primitive.
//!
//! A [`Slot`] is a single-value arena: either the bytes of a value stored
//! inline, or the pointer to the heap block holding it. All of its fields
//! start at offset 0, so the address of the slot is also the address of an
//! inline value, and the address where the heap pointer is stored.

use core::{
    cell::UnsafeCell,
    mem::{ManuallyDrop, MaybeUninit},
    ptr::NonNull,
};

use crate::util::Erased;

/// Storage for one erased value.
///
/// The slot itself does not know which variant is active; that is decided by
/// the bound table's layout and the storage policy.
#[repr(C)]
pub(crate) union Slot<B> {
    /// Inline bytes, sized and aligned like `B`. Shared references to the
    /// slot may still mutate a held value with interior mutability.
    inline: ManuallyDrop<UnsafeCell<MaybeUninit<B>>>,
    /// Pointer to the heap block holding the value.
    heap: NonNull<Erased>,
}

impl<B> Slot<B> {
    /// Creates a slot with no live contents.
    #[inline]
    pub(crate) const fn uninit() -> Self {
        Self {
            inline: ManuallyDrop::new(UnsafeCell::new(MaybeUninit::uninit())),
        }
    }

    /// Returns the address of the slot, valid for reads.
    #[inline]
    pub(crate) fn as_ptr(&self) -> NonNull<Erased> {
        NonNull::from(self).cast::<Erased>()
    }

    /// Returns the address of the slot, valid for reads and writes.
    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> NonNull<Erased> {
        NonNull::from(self).cast::<Erased>()
    }

    /// Returns the stored heap pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The heap variant was written with [`set_heap`](Self::set_heap) and
    ///    has not been overwritten since.
    #[inline]
    pub(crate) unsafe fn heap(&self) -> NonNull<Erased> {
        // SAFETY: The heap variant is active as guaranteed by the caller.
        unsafe { self.heap }
    }

    /// Stores a heap pointer, making the heap variant active.
    #[inline]
    pub(crate) fn set_heap(&mut self, block: NonNull<Erased>) {
        self.heap = block;
    }
}

/// Constructs `value` in the raw region at `dst`.
///
/// This is the only way values enter a slot or a heap block; construction,
/// copying and emplacement all end up here.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `dst` is valid for writes of a `T` and aligned for `T`.
/// 2. `dst` holds no live value (it would be overwritten without being
///    dropped).
#[inline]
pub(crate) unsafe fn place<T>(dst: NonNull<Erased>, value: T) {
    // SAFETY: The region is valid, aligned and empty as guaranteed by the
    // caller.
    unsafe { dst.cast::<T>().write(value) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{A1, A16, A8};

    #[test]
    fn test_slot_layout() {
        // A slot is at least as large as its buffer and can hold a pointer.
        assert_eq!(size_of::<Slot<A8<24>>>(), 24);
        assert_eq!(align_of::<Slot<A8<24>>>(), 8);
        assert_eq!(size_of::<Slot<A1<1>>>(), size_of::<usize>());
        assert_eq!(align_of::<Slot<A16<32>>>(), 16);
    }

    #[test]
    fn test_place_into_slot() {
        let mut slot = Slot::<A8<16>>::uninit();
        let dst = slot.as_mut_ptr();
        // SAFETY: The slot is 16 bytes aligned to 8 and holds nothing.
        unsafe { place(dst, [3u64, 4u64]) };
        // SAFETY: We just wrote a `[u64; 2]` at the slot address.
        let value = unsafe { slot.as_ptr().cast::<[u64; 2]>().read() };
        assert_eq!(value, [3, 4]);
    }
}

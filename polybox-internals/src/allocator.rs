//! The allocator collaborator used when a value does not fit inline.
//!
//! Allocators are selected per container *type* through
//! [`StoragePolicy::Allocator`](crate::policy::StoragePolicy::Allocator), so
//! they are expressed as associated functions rather than methods: a
//! container never stores an allocator instance next to its value.

use core::{alloc::Layout, ptr::NonNull};

/// A source of heap blocks for values that exceed the inline capacity.
///
/// # Safety
///
/// Implementors must guarantee:
///
/// 1. A pointer returned by [`allocate`](Allocator::allocate) is valid for
///    reads and writes of `layout.size()` bytes and aligned to
///    `layout.align()`, until it is passed to
///    [`deallocate`](Allocator::deallocate).
/// 2. Blocks handed out are not aliased by any other live block.
/// 3. A block may be deallocated on a different thread than the one that
///    allocated it, since thread-safe containers move their blocks along.
///
/// # Examples
///
/// Wrapping [`Global`] to count allocations:
///
/// ```
/// use core::{
///     alloc::Layout,
///     ptr::NonNull,
///     sync::atomic::{AtomicUsize, Ordering},
/// };
///
/// use polybox_internals::allocator::{Allocator, Global};
///
/// static COUNT: AtomicUsize = AtomicUsize::new(0);
///
/// struct Counting;
///
/// unsafe impl Allocator for Counting {
///     unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>> {
///         COUNT.fetch_add(1, Ordering::Relaxed);
///         // SAFETY: forwarded caller contract
///         unsafe { Global::allocate(layout) }
///     }
///
///     unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout) {
///         // SAFETY: forwarded caller contract
///         unsafe { Global::deallocate(ptr, layout) }
///     }
/// }
/// ```
pub unsafe trait Allocator: 'static {
    /// Allocates a block for `layout`, or returns `None` on exhaustion.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `layout.size()` is not zero.
    unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a block previously returned by
    /// [`allocate`](Allocator::allocate).
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` was returned by `Self::allocate(layout)` with the same
    ///    `layout`.
    /// 2. The block has not been released before and is not used afterwards.
    unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout);
}

/// The process allocator, as used by [`Box`](alloc::boxed::Box).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Global;

// SAFETY: `alloc::alloc::alloc` upholds both guarantees for non-zero layouts.
unsafe impl Allocator for Global {
    #[inline]
    unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        debug_assert_ne!(layout.size(), 0);
        // SAFETY: The caller guarantees that the layout is not zero-sized.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr)
    }

    #[inline]
    unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: The caller guarantees the block came from `allocate` with the
        // same layout and is released exactly once.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_round_trip() {
        let layout = Layout::new::<[u64; 8]>();
        // SAFETY: The layout is not zero-sized.
        let ptr = unsafe { Global::allocate(layout) };
        let Some(ptr) = ptr else {
            panic!("allocation failed");
        };
        assert_eq!(ptr.as_ptr() as usize % layout.align(), 0);
        // SAFETY: The block came from `Global::allocate` with this layout.
        unsafe { Global::deallocate(ptr, layout) };
    }
}

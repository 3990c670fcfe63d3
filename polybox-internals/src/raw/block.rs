//! Heap blocks for values that do not fit inline.

use core::{alloc::Layout, marker::PhantomData, ptr::NonNull};

use crate::{allocator::Allocator, util::Erased};

/// Obtains a block for `layout` from `A`.
///
/// Zero-sized layouts never reach the allocator; they get a dangling pointer
/// with the requested alignment. Allocation failure aborts through
/// [`handle_alloc_error`](alloc::alloc::handle_alloc_error), as [`Box`] does.
///
/// [`Box`]: alloc::boxed::Box
pub(crate) fn allocate<A: Allocator>(layout: Layout) -> NonNull<Erased> {
    if layout.size() == 0 {
        return dangling(layout);
    }
    // SAFETY: The layout is not zero-sized.
    let block = unsafe { A::allocate(layout) };
    match block {
        Some(block) => block.cast::<Erased>(),
        None => alloc::alloc::handle_alloc_error(layout),
    }
}

/// Releases a block obtained from [`allocate`].
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `block` was returned by `allocate::<A>(layout)` with the same layout.
/// 2. The block holds no live value and is not used afterwards.
pub(crate) unsafe fn deallocate<A: Allocator>(block: NonNull<Erased>, layout: Layout) {
    if layout.size() == 0 {
        return;
    }
    // SAFETY: Non-zero-sized blocks come from `A::allocate` with this layout,
    // as guaranteed by the caller.
    unsafe { A::deallocate(block.cast::<u8>(), layout) }
}

/// A dangling, well-aligned pointer for a zero-sized layout.
fn dangling(layout: Layout) -> NonNull<Erased> {
    let ptr = core::ptr::without_provenance_mut::<Erased>(layout.align());
    // SAFETY: Alignments are never zero.
    unsafe { NonNull::new_unchecked(ptr) }
}

/// A block that is released when dropped, unless it is
/// [`release`](BlockGuard::release)d first.
///
/// Protects freshly allocated blocks while a value is being written into them
/// by code that may panic (a user `Clone` implementation).
pub(crate) struct BlockGuard<A: Allocator> {
    /// The guarded block.
    block: NonNull<Erased>,
    /// Layout the block was allocated with.
    layout: Layout,
    /// Allocator the block came from.
    _allocator: PhantomData<fn() -> A>,
}

impl<A: Allocator> BlockGuard<A> {
    /// Allocates a block for `layout` and guards it.
    pub(crate) fn allocate(layout: Layout) -> Self {
        Self {
            block: allocate::<A>(layout),
            layout,
            _allocator: PhantomData,
        }
    }

    /// Guards a block that already holds a value about to be destroyed.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `block` was returned by `allocate::<A>(layout)` with the same layout.
    /// 2. Nothing else releases the block.
    pub(crate) unsafe fn adopt(block: NonNull<Erased>, layout: Layout) -> Self {
        Self {
            block,
            layout,
            _allocator: PhantomData,
        }
    }

    /// Address of the guarded block.
    pub(crate) fn as_ptr(&self) -> NonNull<Erased> {
        self.block
    }

    /// Stops guarding the block and returns it.
    pub(crate) fn release(self) -> NonNull<Erased> {
        let block = self.block;
        core::mem::forget(self);
        block
    }
}

impl<A: Allocator> Drop for BlockGuard<A> {
    fn drop(&mut self) {
        // SAFETY: The block came from `allocate::<A>(self.layout)` and the
        // value inside it, if any, was never completed or has been destroyed.
        unsafe { deallocate::<A>(self.block, self.layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Global;

    #[test]
    fn test_zero_sized_blocks_are_aligned() {
        #[repr(align(64))]
        struct Aligned;

        let layout = Layout::new::<Aligned>();
        let block = allocate::<Global>(layout);
        assert_eq!(block.as_ptr() as usize % 64, 0);
        // SAFETY: The block came from `allocate` with this layout.
        unsafe { deallocate::<Global>(block, layout) };
    }

    #[test]
    fn test_guard_releases() {
        let guard = BlockGuard::<Global>::allocate(Layout::new::<u128>());
        let block = guard.release();
        // SAFETY: The block was released from its guard and is freed once.
        unsafe { deallocate::<Global>(block, Layout::new::<u128>()) };

        // Dropping a guard frees its block.
        let guard = BlockGuard::<Global>::allocate(Layout::new::<u128>());
        assert_eq!(guard.as_ptr().as_ptr() as usize % align_of::<u128>(), 0);
        drop(guard);
    }
}

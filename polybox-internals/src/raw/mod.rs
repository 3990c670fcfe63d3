//! The owned, type-erased value slot.

mod block;
pub(crate) mod slot;
mod value;

use core::ptr::NonNull;

pub use self::value::RawValue;
use crate::util::Erased;

/// Where a bound value lives.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Placement {
    /// Inside the container's inline buffer.
    Inline,
    /// In a block from the policy's allocator; the inline buffer holds the
    /// pointer to it.
    Heap,
}

/// Resolves the erased context pointer of an inline value.
///
/// Call targets bound to a slot use this (or [`heap_target`]) as their first
/// step, so that resolving the value never branches on the placement.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `ctx` was returned by [`RawValue::storage_ptr`] on a [`RawValue`] whose
///    bound value is a `T` stored with [`Placement::Inline`].
/// 2. The value is not mutated or dropped for the lifetime `'a`.
#[inline(always)]
pub unsafe fn inline_target<'a, T>(ctx: NonNull<Erased>) -> &'a T {
    // SAFETY: An inline value starts at the slot address, as guaranteed by
    // the caller.
    unsafe { ctx.cast::<T>().as_ref() }
}

/// Resolves the erased context pointer of a heap-placed value.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `ctx` was returned by [`RawValue::storage_ptr`] on a [`RawValue`] whose
///    bound value is a `T` stored with [`Placement::Heap`].
/// 2. The value is not mutated or dropped for the lifetime `'a`.
#[inline(always)]
pub unsafe fn heap_target<'a, T>(ctx: NonNull<Erased>) -> &'a T {
    // SAFETY: The slot of a heap-placed value holds the block pointer at
    // offset 0, as guaranteed by the caller.
    let block = unsafe { ctx.cast::<NonNull<Erased>>().read() };
    // SAFETY: The block holds a live `T` for `'a`, as guaranteed by the
    // caller.
    unsafe { block.cast::<T>().as_ref() }
}

//! Storage policies.
//!
//! A [`StoragePolicy`] fixes, at the type level, how much inline space a
//! container reserves, how that space is aligned, whether values that do not
//! fit may spill to the heap, and which [`Allocator`] serves the spill. A
//! policy is never renegotiated per instance: every container of the same
//! type has the same [`StorageDescriptor`].
//!
//! Two policies are provided:
//!
//! - [`InlineOnly<B>`]: values must fit into `B`. Binding a larger or more
//!   strictly aligned type is rejected at compile time.
//! - [`InlineOrHeap<B, A>`]: values that do not fit into `B` are placed in a
//!   block obtained from `A`.

use core::{alloc::Layout, marker::PhantomData};

use crate::{
    allocator::{Allocator, Global},
    space::A8,
};

/// Type-level configuration of a container's storage.
///
/// Only the size and alignment of [`Buffer`](StoragePolicy::Buffer) matter;
/// no value of that type is ever created.
///
/// # Examples
///
/// ```
/// use polybox_internals::{
///     allocator::Global,
///     policy::{StoragePolicy, descriptor},
/// };
///
/// struct SixtyFourBytes;
///
/// impl StoragePolicy for SixtyFourBytes {
///     type Buffer = [u64; 8];
///     type Allocator = Global;
///     const HEAP_FALLBACK: bool = true;
/// }
///
/// assert_eq!(descriptor::<SixtyFourBytes>().capacity(), 64);
/// assert_eq!(descriptor::<SixtyFourBytes>().alignment(), 8);
/// ```
pub trait StoragePolicy: 'static {
    /// Type whose size and alignment define the inline buffer.
    type Buffer: 'static;

    /// Allocator used for values that do not fit inline.
    type Allocator: Allocator;

    /// Whether values that do not fit inline are placed on the heap. When
    /// `false`, binding such a value fails to compile.
    const HEAP_FALLBACK: bool;
}

/// The `(capacity, alignment)` pair of an inline buffer.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct StorageDescriptor {
    /// Size of the inline buffer in bytes.
    capacity: usize,
    /// Alignment of the inline buffer in bytes.
    alignment: usize,
}

impl StorageDescriptor {
    /// Returns the descriptor of a buffer of type `B`.
    #[inline]
    #[must_use]
    pub const fn of<B>() -> Self {
        Self {
            capacity: size_of::<B>(),
            alignment: align_of::<B>(),
        }
    }

    /// Size of the inline buffer in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(self) -> usize {
        self.capacity
    }

    /// Alignment of the inline buffer in bytes.
    #[inline]
    #[must_use]
    pub const fn alignment(self) -> usize {
        self.alignment
    }

    /// Returns `true` if a value with `layout` can be stored inline.
    ///
    /// This holds exactly when the value is no larger than the buffer and
    /// its alignment requirement is no stricter than the buffer's.
    #[inline]
    #[must_use]
    pub const fn fits(self, layout: Layout) -> bool {
        layout.size() <= self.capacity && layout.align() <= self.alignment
    }
}

/// Returns the [`StorageDescriptor`] of the policy `P`.
#[inline]
#[must_use]
pub const fn descriptor<P: StoragePolicy>() -> StorageDescriptor {
    StorageDescriptor::of::<P::Buffer>()
}

/// Policy that stores values inside `B` and never allocates.
///
/// Binding a value that does not fit into `B` is a compile-time error.
pub struct InlineOnly<B: 'static>(PhantomData<fn() -> B>);

impl<B: 'static> StoragePolicy for InlineOnly<B> {
    type Buffer = B;
    type Allocator = Global;
    const HEAP_FALLBACK: bool = false;
}

/// Policy that stores values inside `B` when they fit, and in a block from
/// `A` otherwise.
pub struct InlineOrHeap<B: 'static, A: Allocator = Global>(PhantomData<fn() -> (B, A)>);

impl<B: 'static, A: Allocator> StoragePolicy for InlineOrHeap<B, A> {
    type Buffer = B;
    type Allocator = A;
    const HEAP_FALLBACK: bool = true;
}

/// Policy used when none is specified: 24 inline bytes aligned to 8, with
/// spill to the global allocator.
pub type DefaultPolicy = InlineOrHeap<A8<24>, Global>;

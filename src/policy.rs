//! Storage policies and allocators.
//!
//! A [`StoragePolicy`] is a type-level configuration: it is never
//! instantiated, and two containers with different policies are different
//! types. The built-in policies cover the common cases:
//!
//! - [`InlineOrHeap<B, A>`]: values fitting `B` are stored inline, others in
//!   a block from the allocator `A` (default [`Global`]).
//! - [`InlineOnly<B>`]: values must fit `B`; others are rejected at compile
//!   time.
//!
//! Buffers are usually one of the aligned types in [`space`](crate::space),
//! but any sized type works: `InlineOnly<[usize; 4]>` stores values up to
//! four words with word alignment.
//!
//! # Custom allocators
//!
//! ```
//! use core::{alloc::Layout, ptr::NonNull};
//!
//! use polybox::{
//!     PolyBox,
//!     policy::{Allocator, Global, InlineOrHeap},
//!     space::A8,
//! };
//!
//! struct Logged;
//!
//! // SAFETY: Forwards every call to `Global`.
//! unsafe impl Allocator for Logged {
//!     unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>> {
//!         println!("allocating {} bytes", layout.size());
//!         // SAFETY: Same contract as ours.
//!         unsafe { Global::allocate(layout) }
//!     }
//!
//!     unsafe fn deallocate(ptr: NonNull<u8>, layout: Layout) {
//!         // SAFETY: Same contract as ours.
//!         unsafe { Global::deallocate(ptr, layout) }
//!     }
//! }
//!
//! let value: PolyBox<InlineOrHeap<A8<8>, Logged>> = PolyBox::new([1u64; 4]);
//! assert!(value.is_heap());
//! ```

pub use polybox_internals::{
    allocator::{Allocator, Global},
    policy::{
        DefaultPolicy, InlineOnly, InlineOrHeap, StorageDescriptor, StoragePolicy, descriptor,
    },
};

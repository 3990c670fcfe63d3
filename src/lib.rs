#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Extra checks on nightly
#![cfg_attr(nightly_extra_checks, feature(rustdoc_missing_doc_code_examples))]
#![cfg_attr(nightly_extra_checks, forbid(rustdoc::missing_doc_code_examples))]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Value-semantic, type-erased containers with inline storage.
//!
//! ## Overview
//!
//! This crate provides two containers that can hold a value of any type
//! without naming that type in their own:
//!
//! - [`PolyBox`] holds any `'static` value, like a `Box<dyn Any>` that can be
//!   copied, moved out of and replaced.
//! - [`PolyFn`] holds a callable with a fixed signature, like a
//!   `Box<dyn Fn(..)>`.
//!
//! Both store values that fit a configurable buffer inside the container
//! itself, so that small values never allocate. Larger values are placed in a
//! heap block, or rejected at compile time if the storage policy does not
//! allow it.
//!
//! ## Quick Example
//!
//! ```
//! use polybox::{PolyBox, PolyFn};
//!
//! let mut value: PolyBox = PolyBox::new(42i32);
//! assert_eq!(value.get::<i32>(), Ok(&42));
//! assert!(value.is_inline());
//!
//! value.emplace(String::from("hello"));
//! assert!(value.holds::<String>());
//!
//! let greet: PolyFn<fn(&'static str) -> usize> = PolyFn::new(|name: &str| name.len());
//! assert_eq!(greet.call("world"), 5);
//! ```
//!
//! ## Core Concepts
//!
//! A container is either empty or holds exactly one value. When a value is
//! bound, the container records two things next to it:
//!
//! - A **type token**, the comparable identity of the value's type, used by
//!   [`holds`](PolyBox::holds) and [`get`](PolyBox::get).
//! - An **operation table**, a `'static` record of plain function pointers
//!   that destroy, copy, relocate and swap values of that type. Tables replace
//!   the vtable of a trait object and can be shared: every [`Copy`] type of the
//!   same size and alignment bound with [`new_trivial`](PolyBox::new_trivial)
//!   uses the same table.
//!
//! [`PolyFn`] additionally binds a **trampoline**: a function pointer that
//! receives the address of the stored target and the call arguments. It is
//! resolved once when the target is bound, so a call is one indirect jump.
//!
//! ## Storage Policies
//!
//! The first type parameter of both containers is a [`StoragePolicy`]. It
//! names a buffer type whose size and alignment define the inline capacity,
//! whether values that do not fit may go to the heap, and the
//! [`Allocator`] used for them:
//!
//! ```
//! use polybox::{
//!     PolyBox,
//!     policy::{InlineOnly, InlineOrHeap},
//!     space::{A8, A16},
//! };
//!
//! // 16 bytes aligned to 8; larger values go to the heap.
//! let spilled: PolyBox<InlineOrHeap<A8<16>>> = PolyBox::new([0u64; 4]);
//! assert!(spilled.is_heap());
//!
//! // 32 bytes aligned to 16 and no heap at all.
//! let fixed: PolyBox<InlineOnly<A16<32>>> = PolyBox::new(7u128);
//! assert!(fixed.is_inline());
//! ```
//!
//! Binding a value that does not fit an inline-only policy fails when the
//! constructor is instantiated, so `PolyBox<InlineOnly<A8<8>>>::new([0u64; 2])`
//! is rejected by `cargo build` (though not by `cargo check`).
//!
//! ## Capabilities
//!
//! Which operations survive erasure is decided by the constructor:
//!
//! - [`PolyBox::new`] keeps the value's [`Clone`] implementation.
//! - [`PolyBox::new_move_only`] accepts any value; copying the container fails
//!   with [`ContainerError::NotCopyable`].
//! - [`PolyBox::new_trivial`] accepts [`Copy`] values and shares their table by
//!   shape.
//!
//! ## Thread Safety
//!
//! The last type parameter is a thread-safety marker from [`markers`]. The
//! default, [`SendSync`](markers::SendSync), only accepts `Send + Sync`
//! values and makes the container `Send + Sync`.
//! [`Local`](markers::Local) accepts anything.
//!
//! ## Errors
//!
//! Recoverable failures are reported as [`ContainerError`] values. The one
//! exception is [`PolyFn::call`] on an empty callable, which panics so that
//! calls never branch on emptiness; [`PolyFn::try_call`] is the guarded
//! alternative. [`ContainerError`] implements [`core::error::Error`] and can be
//! propagated into error reporting types with `?`.
//!
//! ## Related crates
//!
//! - `polybox-internals` holds the unsafe, type-erased machinery. It is an
//!   implementation detail without semver guarantees.
//! - `polybox-tracing` provides an allocator that emits `tracing` events for
//!   every heap block, to find values that unexpectedly spill.

extern crate alloc;

mod error;
pub mod markers;
pub mod policy;
mod poly_box;
mod poly_fn;
pub mod prelude;

pub use polybox_internals::{Placement, Shape, TypeToken, space};

pub use self::{
    error::ContainerError,
    poly_box::PolyBox,
    poly_fn::{CallTarget, PolyFn, Signature},
};

#[doc(no_inline)]
pub use self::policy::{Allocator, StoragePolicy};

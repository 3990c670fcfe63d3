#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]
#![deny(missing_copy_implementations)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`polybox`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased storage and the unsafe
//! operations that power the [`polybox`] containers. A value of any `'static`
//! type is written into an inline buffer (or a heap block when it does not
//! fit), and every lifecycle operation afterwards goes through a table of
//! plain function pointers that was selected when the value was bound.
//!
//! **This crate is an implementation detail.** No semantic versioning guarantees
//! are provided. Users should depend on the [`polybox`] crate, not this one.
//!
//! # Architecture
//!
//! - **[`policy`]**: Type-level storage configuration
//!   - [`StoragePolicy`]: inline buffer, heap fallback switch and allocator
//!   - [`StorageDescriptor`]: the `(capacity, alignment)` pair of a policy
//! - **[`space`]**: Ready-made aligned buffer types (`A8<24>` and friends)
//! - **[`allocator`]**: The [`Allocator`] collaborator used on the heap fallback
//!   path, and the [`Global`] allocator
//! - **[`capability`]**: Marker types choosing which [`OperationTable`] a type
//!   is bound to ([`Cloneable`], [`MoveOnly`], [`Trivial`])
//! - **Operation tables**: [`OperationTable`] holds `destroy`, `clone_into`,
//!   `relocate` and `swap`. Tables are created once per type, or once per
//!   `(size, align)` shape for [`Trivial`] types.
//! - **[`TypeToken`]**: Comparable runtime identity of the erased type
//! - **[`RawValue`]**: The owned, type-erased slot that ties all of the above
//!   together
//!
//! # Safety Strategy
//!
//! The only place where a pointer into a slot can be paired with a table is
//! [`RawValue`], and the pairing happens when a value is written. Since the
//! binding field is private to that module and is only replaced together with
//! the slot contents, the table always describes the bytes in the slot.
//!
//! [`polybox`]: https://docs.rs/polybox/latest/polybox/
//! [`StoragePolicy`]: policy::StoragePolicy
//! [`StorageDescriptor`]: policy::StorageDescriptor
//! [`Allocator`]: allocator::Allocator
//! [`Global`]: allocator::Global
//! [`Cloneable`]: capability::Cloneable
//! [`MoveOnly`]: capability::MoveOnly
//! [`Trivial`]: capability::Trivial

extern crate alloc;

pub mod allocator;
pub mod capability;
pub mod policy;
mod raw;
pub mod space;
mod table;
mod token;
mod util;

pub use raw::{Placement, RawValue, heap_target, inline_target};
pub use table::{OperationTable, Shape};
pub use token::TypeToken;
pub use util::Erased;

//! Operation tables for type-erased lifecycle operations.
//!
//! An [`OperationTable`] is the replacement for a `dyn` vtable: a record of
//! plain function pointers performing the lifecycle operations of one erased
//! type. Every entry receives the table itself as its first argument, which
//! lets the shared shape tables in [`shape`] read the size of the value they
//! operate on.
//!
//! This module encapsulates the fields of [`OperationTable`] so they cannot
//! be accessed directly. This visibility restriction guarantees the safety
//! invariant: **the function pointers of a table operate on values with the
//! table's `layout`, and on values of the type the table was created for**.
//!
//! # Safety Invariant
//!
//! Tables are only created by [`OperationTable::cloneable`],
//! [`OperationTable::move_only`] (which instantiate the entries in [`typed`]
//! with a specific `T`) and [`shape::table_for`] (which only serves types
//! without drop glue whose bytes alone define the value).

pub(crate) mod shape;
mod typed;

use core::{alloc::Layout, ptr::NonNull};

pub use self::shape::Shape;
use crate::util::Erased;

/// Signature of an entry operating on a single value.
type UnaryEntry = unsafe fn(&OperationTable, NonNull<Erased>);

/// Signature of an entry operating on a pair of values or regions.
type BinaryEntry = unsafe fn(&OperationTable, NonNull<Erased>, NonNull<Erased>);

/// Lifecycle operations for values of one erased type or shape.
///
/// Tables are immutable and `'static`. Per-type tables are created once per
/// monomorphization; tables for [`Trivial`](crate::capability::Trivial) types
/// are shared by every type with the same [`Shape`], so
/// `core::ptr::eq` holds between the tables of, for example, `u64` and
/// `f64`.
///
/// # Safety Invariant
///
/// The fields `destroy`, `clone_into`, `relocate` and `swap` are guaranteed
/// to be correct for values whose layout is `layout` and whose type is the
/// type (or one of the types) this table was created for.
#[allow(
    missing_copy_implementations,
    reason = "tables are only handed out as `&'static` references"
)]
pub struct OperationTable {
    /// Layout of the values this table operates on.
    layout: Layout,
    /// Whether this table is shared between every type of its shape.
    shared: bool,
    /// Runs the destructor of the value in place.
    destroy: UnaryEntry,
    /// Writes a copy of the value at the first pointer into the uninitialized
    /// region at the second pointer. Absent for types that cannot be copied.
    clone_into: Option<BinaryEntry>,
    /// Moves the value at the first pointer into the uninitialized region at
    /// the second pointer, ending the lifetime of the source.
    relocate: BinaryEntry,
    /// Exchanges the values at the two pointers.
    swap: BinaryEntry,
}

impl OperationTable {
    /// Returns the table for a copyable type `T`.
    #[inline]
    pub(crate) const fn cloneable<T: Clone + 'static>() -> &'static Self {
        const {
            &Self {
                layout: Layout::new::<T>(),
                shared: false,
                destroy: typed::destroy::<T>,
                clone_into: Some(typed::clone_into::<T>),
                relocate: typed::relocate::<T>,
                swap: typed::swap::<T>,
            }
        }
    }

    /// Returns the table for a type `T` that cannot be copied.
    #[inline]
    pub(crate) const fn move_only<T: 'static>() -> &'static Self {
        const {
            &Self {
                layout: Layout::new::<T>(),
                shared: false,
                destroy: typed::destroy::<T>,
                clone_into: None,
                relocate: typed::relocate::<T>,
                swap: typed::swap::<T>,
            }
        }
    }

    /// Layout of the values this table operates on.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns `true` if this table is a shape table shared between every
    /// trivially copyable type of the same size and alignment.
    #[inline]
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Returns `true` if values bound to this table can be copied.
    #[inline]
    #[must_use]
    pub fn is_cloneable(&self) -> bool {
        self.clone_into.is_some()
    }

    /// Runs the destructor of the value at `ptr`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` points to a live value this table was created for.
    /// 2. The value is not used afterwards, and is not destroyed or relocated
    ///    again.
    #[inline]
    pub(crate) unsafe fn destroy(&self, ptr: NonNull<Erased>) {
        // SAFETY: We know that `self.destroy` operates on values described by
        // this table. Its safety requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            (self.destroy)(self, ptr);
        }
    }

    /// Writes a copy of the value at `src` into `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. [`is_cloneable`](Self::is_cloneable) returns `true`.
    /// 2. `src` points to a live value this table was created for.
    /// 3. `dst` is valid for writes of `self.layout()` and suitably aligned,
    ///    and holds no live value.
    #[inline]
    pub(crate) unsafe fn clone_into(&self, src: NonNull<Erased>, dst: NonNull<Erased>) {
        debug_assert!(self.is_cloneable());
        if let Some(clone_into) = self.clone_into {
            // SAFETY: We know that `clone_into` operates on values described by
            // this table. Its safety requirements are upheld:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            unsafe {
                clone_into(self, src, dst);
            }
        }
    }

    /// Moves the value at `src` into `dst`. Afterwards `src` holds no live
    /// value and must be neither destroyed nor read.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `src` points to a live value this table was created for.
    /// 2. `dst` is valid for writes of `self.layout()` and suitably aligned,
    ///    holds no live value, and does not overlap `src`.
    #[inline]
    pub(crate) unsafe fn relocate(&self, src: NonNull<Erased>, dst: NonNull<Erased>) {
        // SAFETY: We know that `self.relocate` operates on values described by
        // this table. Its safety requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            (self.relocate)(self, src, dst);
        }
    }

    /// Exchanges the values at `a` and `b`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `a` and `b` both point to live values this table was created for.
    /// 2. The two values do not overlap.
    #[inline]
    pub(crate) unsafe fn swap(&self, a: NonNull<Erased>, b: NonNull<Erased>) {
        // SAFETY: We know that `self.swap` operates on values described by
        // this table. Its safety requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            (self.swap)(self, a, b);
        }
    }
}

impl core::fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OperationTable")
            .field("size", &self.layout.size())
            .field("align", &self.layout.align())
            .field("shared", &self.shared)
            .field("cloneable", &self.is_cloneable())
            .finish_non_exhaustive()
    }
}

//! Capability markers selecting the [`OperationTable`] of a bound value.
//!
//! Which lifecycle operations a type supports is decided at compile time by
//! the marker passed when the value is bound, never by a runtime base-class
//! relationship:
//!
//! | Marker        | Requires        | Copy entry | Table                       |
//! |---------------|-----------------|------------|-----------------------------|
//! | [`Cloneable`] | `T: Clone`      | yes        | one per type                |
//! | [`MoveOnly`]  | nothing         | no         | one per type                |
//! | [`Trivial`]   | `T: Copy`       | yes        | one per `(size, align)`     |
//!
//! Shapes larger than [`MAX_SHARED_SIZE`] or more aligned than
//! [`MAX_SHARED_ALIGN`] have no shared table, and [`Trivial`] falls back to
//! the per-type table of [`Cloneable`].
//!
//! [`MAX_SHARED_SIZE`]: crate::Shape::MAX_SHARED_SIZE
//! [`MAX_SHARED_ALIGN`]: crate::Shape::MAX_SHARED_ALIGN
//!
//! The [`Capabilities`] trait is sealed: the pairing between a type and its
//! table is part of the safety invariant of [`RawValue`](crate::RawValue).

use core::alloc::Layout;

use crate::table::{OperationTable, shape};

mod sealed {
    pub trait Sealed: 'static {}

    impl Sealed for super::Cloneable {}
    impl Sealed for super::MoveOnly {}
    impl Sealed for super::Trivial {}
}

/// A set of lifecycle operations that values of type `T` can be bound with.
///
/// Implemented by [`Cloneable`], [`MoveOnly`] and [`Trivial`].
pub trait Capabilities<T: 'static>: sealed::Sealed {
    /// Returns the operation table for `T` under this capability set.
    #[doc(hidden)]
    fn operation_table() -> &'static OperationTable;
}

/// Values keep their [`Clone`] implementation after being erased.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Cloneable;

/// Values can be moved and destroyed, but copying them fails with
/// `NotCopyable`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct MoveOnly;

/// Values are plain bytes (`Copy`, no drop glue) and share one table with
/// every other such type of the same size and alignment, within the bounds
/// of [`Shape::MAX_SHARED_SIZE`](crate::Shape::MAX_SHARED_SIZE) and
/// [`Shape::MAX_SHARED_ALIGN`](crate::Shape::MAX_SHARED_ALIGN).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Trivial;

impl<T: Clone + 'static> Capabilities<T> for Cloneable {
    #[inline]
    fn operation_table() -> &'static OperationTable {
        OperationTable::cloneable::<T>()
    }
}

impl<T: 'static> Capabilities<T> for MoveOnly {
    #[inline]
    fn operation_table() -> &'static OperationTable {
        OperationTable::move_only::<T>()
    }
}

impl<T: Copy + 'static> Capabilities<T> for Trivial {
    #[inline]
    fn operation_table() -> &'static OperationTable {
        shape::table_for(Layout::new::<T>()).unwrap_or_else(OperationTable::cloneable::<T>)
    }
}

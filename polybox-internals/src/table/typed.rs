//! Table entries instantiated for one concrete type.

use core::ptr::{self, NonNull};

use crate::{raw::slot, table::OperationTable, util::Erased};

/// Drops the `T` at `ptr` in place.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `ptr` points to a live `T`, which is not used afterwards.
pub(super) unsafe fn destroy<T>(_table: &OperationTable, ptr: NonNull<Erased>) {
    let ptr: NonNull<T> = ptr.cast::<T>();
    // SAFETY: The pointer is aligned and points to a live `T` owned by the
    // container, as guaranteed by the caller.
    unsafe { ptr.drop_in_place() }
}

/// Writes a clone of the `T` at `src` into `dst`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` points to a live `T`.
/// 2. `dst` is valid for writes of a `T`, aligned, and holds no live value.
pub(super) unsafe fn clone_into<T: Clone>(
    _table: &OperationTable,
    src: NonNull<Erased>,
    dst: NonNull<Erased>,
) {
    // SAFETY: `src` points to a live `T` as guaranteed by the caller, and only
    // shared access is needed to clone it.
    let value: &T = unsafe { src.cast::<T>().as_ref() };
    let copy = value.clone();
    // SAFETY: `dst` is valid for writes of a `T` as guaranteed by the caller.
    unsafe { slot::place(dst, copy) }
}

/// Moves the `T` at `src` into `dst`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` points to a live `T`, which is treated as uninitialized
///    afterwards.
/// 2. `dst` is valid for writes of a `T`, aligned, and does not overlap
///    `src`.
pub(super) unsafe fn relocate<T>(
    _table: &OperationTable,
    src: NonNull<Erased>,
    dst: NonNull<Erased>,
) {
    // SAFETY: Both regions are valid, aligned and disjoint as guaranteed by
    // the caller. Every Rust value may be moved by copying its bytes.
    unsafe { ptr::copy_nonoverlapping(src.cast::<T>().as_ptr(), dst.cast::<T>().as_ptr(), 1) }
}

/// Exchanges the `T`s at `a` and `b`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `a` and `b` point to live, disjoint `T`s.
pub(super) unsafe fn swap<T>(_table: &OperationTable, a: NonNull<Erased>, b: NonNull<Erased>) {
    // SAFETY: Both values are live, aligned and disjoint as guaranteed by the
    // caller.
    unsafe { ptr::swap_nonoverlapping(a.cast::<T>().as_ptr(), b.cast::<T>().as_ptr(), 1) }
}

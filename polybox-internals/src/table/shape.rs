//! Operation tables shared between trivially copyable types.
//!
//! Types whose bytes alone define their value (no drop glue, copyable by
//! `memcpy`) need the same lifecycle code whenever they have the same size
//! and alignment. Instead of generating one table per type, a single table is
//! created for each [`Shape`] the first time it is requested and reused for
//! the rest of the process.
//!
//! The tables live in a fixed static array with one slot per shape up to
//! [`Shape::MAX_SHARED_SIZE`] and [`Shape::MAX_SHARED_ALIGN`], so looking one
//! up never allocates. Larger shapes get no shared table; their types fall
//! back to a table of their own.

use core::{
    alloc::Layout,
    ptr::{self, NonNull},
};

use spin::Once;

use crate::{table::OperationTable, util::Erased};

/// The size and alignment of a trivially copyable type.
///
/// # Examples
///
/// ```
/// use polybox_internals::Shape;
///
/// assert_eq!(Shape::of::<u64>(), Shape::of::<f64>());
/// assert_eq!(Shape::of::<u64>(), Shape::of::<[u64; 1]>());
/// // Same size, weaker alignment
/// assert_ne!(Shape::of::<u64>(), Shape::of::<[u32; 2]>());
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Shape {
    /// Size in bytes.
    size: usize,
    /// Alignment in bytes.
    align: usize,
}

impl Shape {
    /// Largest size, in bytes, of a shape with a shared table.
    pub const MAX_SHARED_SIZE: usize = 256;

    /// Largest alignment, in bytes, of a shape with a shared table.
    pub const MAX_SHARED_ALIGN: usize = 64;

    /// Returns the shape of `T`.
    #[inline]
    #[must_use]
    pub const fn of<T>() -> Self {
        Self::from_layout(Layout::new::<T>())
    }

    /// Returns the shape described by `layout`.
    #[inline]
    #[must_use]
    pub const fn from_layout(layout: Layout) -> Self {
        Self {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// Size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }

    /// Alignment in bytes.
    #[inline]
    #[must_use]
    pub const fn align(self) -> usize {
        self.align
    }

    /// Returns `true` if trivially copyable types of this shape share one
    /// table.
    ///
    /// # Examples
    ///
    /// ```
    /// use polybox_internals::Shape;
    ///
    /// assert!(Shape::of::<[u64; 32]>().has_shared_table());
    /// assert!(!Shape::of::<[u8; 257]>().has_shared_table());
    /// ```
    #[inline]
    #[must_use]
    pub const fn has_shared_table(self) -> bool {
        slot_index(self).is_some()
    }
}

/// Number of alignment classes, one per power of two up to
/// [`Shape::MAX_SHARED_ALIGN`].
const ALIGN_CLASSES: u32 = Shape::MAX_SHARED_ALIGN.trailing_zeros() + 1;

/// Index of the first slot of alignment class `class`.
///
/// Class `k` holds the sizes `0, 2^k, 2 * 2^k, ..` up to
/// [`Shape::MAX_SHARED_SIZE`], which is `(MAX_SHARED_SIZE >> k) + 1` slots.
const fn class_offset(class: u32) -> usize {
    2 * (Shape::MAX_SHARED_SIZE - (Shape::MAX_SHARED_SIZE >> class)) + class as usize
}

const SLOTS: usize = class_offset(ALIGN_CLASSES);

/// Returns the slot of `shape` in [`SHAPE_TABLES`], or `None` past the bounds.
const fn slot_index(shape: Shape) -> Option<usize> {
    if shape.size > Shape::MAX_SHARED_SIZE || shape.align > Shape::MAX_SHARED_ALIGN {
        return None;
    }
    // Layout sizes are multiples of their power-of-two alignment.
    Some(class_offset(shape.align.trailing_zeros()) + shape.size / shape.align)
}

/// One lazily created table per shape within the bounds.
static SHAPE_TABLES: [Once<OperationTable>; SLOTS] = [const { Once::new() }; SLOTS];

/// Returns the table shared by every trivially copyable type with `layout`,
/// or `None` if the shape is past the bounds of the shared tables.
///
/// The returned reference is the same for every call with an equal layout.
pub(crate) fn table_for(layout: Layout) -> Option<&'static OperationTable> {
    let slot = SHAPE_TABLES.get(slot_index(Shape::from_layout(layout))?)?;
    Some(slot.call_once(|| OperationTable::for_shape(layout)))
}

impl OperationTable {
    /// Creates the table for values with `layout` that have no drop glue and
    /// are copied by copying their bytes.
    const fn for_shape(layout: Layout) -> Self {
        Self {
            layout,
            shared: true,
            destroy: destroy_nothing,
            clone_into: Some(copy_bytes),
            relocate: copy_bytes,
            swap: swap_bytes,
        }
    }
}

/// Trivially copyable values have nothing to destroy.
///
/// # Safety
///
/// Always safe to call; `unsafe` only to match the table entry signature.
unsafe fn destroy_nothing(_table: &OperationTable, _ptr: NonNull<Erased>) {}

/// Copies `table.layout().size()` bytes from `src` to `dst`.
///
/// Serves both as `clone_into` and `relocate` for trivially copyable values.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` is valid for reads and `dst` for writes of the table's layout.
/// 2. The two regions do not overlap.
unsafe fn copy_bytes(table: &OperationTable, src: NonNull<Erased>, dst: NonNull<Erased>) {
    // SAFETY: Both regions are valid for the table's size and disjoint, as
    // guaranteed by the caller.
    unsafe {
        ptr::copy_nonoverlapping(
            src.cast::<u8>().as_ptr(),
            dst.cast::<u8>().as_ptr(),
            table.layout.size(),
        );
    }
}

/// Exchanges `table.layout().size()` bytes between `a` and `b`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `a` and `b` are valid for reads and writes of the table's layout.
/// 2. The two regions do not overlap.
unsafe fn swap_bytes(table: &OperationTable, a: NonNull<Erased>, b: NonNull<Erased>) {
    // SAFETY: Both regions are valid for the table's size and disjoint, as
    // guaranteed by the caller.
    unsafe {
        ptr::swap_nonoverlapping(
            a.cast::<u8>().as_ptr(),
            b.cast::<u8>().as_ptr(),
            table.layout.size(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(layout: Layout) -> &'static OperationTable {
        table_for(layout).unwrap()
    }

    #[test]
    fn test_same_shape_same_table() {
        let a = shared(Layout::new::<u64>());
        let b = shared(Layout::new::<f64>());
        let c = shared(Layout::new::<[u64; 1]>());

        assert!(core::ptr::eq(a, b));
        assert!(core::ptr::eq(a, c));
        assert!(a.is_shared());
        assert!(a.is_cloneable());
    }

    #[test]
    fn test_different_shape_different_table() {
        let a = shared(Layout::new::<u64>());
        let b = shared(Layout::new::<[u32; 2]>());
        let c = shared(Layout::new::<u32>());

        assert!(!core::ptr::eq(a, b));
        assert!(!core::ptr::eq(a, c));
        assert_eq!(b.layout(), Layout::new::<[u32; 2]>());
    }

    #[test]
    fn test_shape_entries_copy_and_swap() {
        let table = shared(Layout::new::<[u16; 3]>());
        let mut a = [1u16, 2, 3];
        let mut b = [7u16, 8, 9];
        let mut c = [0u16; 3];

        // SAFETY: All three arrays are live, disjoint and have the layout of
        // the table.
        unsafe { table.swap(NonNull::from(&mut a).cast(), NonNull::from(&mut b).cast()) };
        assert_eq!(a, [7, 8, 9]);
        assert_eq!(b, [1, 2, 3]);

        // SAFETY: As above.
        unsafe { table.clone_into(NonNull::from(&mut a).cast(), NonNull::from(&mut c).cast()) };
        assert_eq!(c, [7, 8, 9]);
    }

    #[test]
    fn test_slots_cover_every_shape_once() {
        assert_eq!(SLOTS, 515);

        let mut seen = [false; SLOTS];
        for class in 0..ALIGN_CLASSES {
            let align = 1usize << class;
            for size in (0..=Shape::MAX_SHARED_SIZE).step_by(align) {
                let shape = Shape { size, align };
                let Some(index) = slot_index(shape) else {
                    panic!("{shape:?} has no slot");
                };
                assert!(!seen[index], "{shape:?} reuses slot {index}");
                seen[index] = true;
            }
        }
        assert!(seen.iter().all(|&used| used));
    }

    #[test]
    fn test_large_shapes_have_no_table() {
        assert!(table_for(Layout::new::<[u8; 257]>()).is_none());
        assert!(table_for(Layout::from_size_align(128, 128).unwrap()).is_none());
        assert!(table_for(Layout::new::<[u8; 256]>()).is_some());
        assert!(table_for(Layout::from_size_align(256, 64).unwrap()).is_some());
        assert!(table_for(Layout::new::<()>()).is_some());
    }
}

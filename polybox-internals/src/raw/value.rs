//! [`RawValue`], the owned type-erased slot.
//!
//! This module encapsulates the `slot` and `binding` fields of [`RawValue`],
//! ensuring they can only be changed together through the methods below.

use core::{alloc::Layout, any::TypeId, marker::PhantomData, ptr::NonNull};

use super::{
    Placement,
    block::{self, BlockGuard},
    slot::{self, Slot},
};
use crate::{
    capability::Capabilities,
    policy::{StoragePolicy, descriptor},
    table::OperationTable,
    token::TypeToken,
    util::Erased,
};

/// The table and identity of the value currently held by a [`RawValue`].
#[derive(Copy, Clone)]
struct Binding {
    /// Lifecycle operations for the held value.
    table: &'static OperationTable,
    /// Identity of the held value's type.
    token: TypeToken,
}

/// An owned, type-erased value stored according to the policy `P`.
///
/// A `RawValue` is either empty or holds exactly one value. Values whose
/// layout fits the policy's buffer live inline; larger or over-aligned values
/// live in a block from `P::Allocator` when the policy allows it. Binding a
/// value that cannot be stored under `P` is rejected at compile time.
///
/// Dropping a `RawValue` destroys the held value and then releases its block,
/// if any.
///
/// # Thread safety
///
/// `RawValue` is neither `Send` nor `Sync`, since it accepts values of any
/// type. Wrappers that restrict the accepted types decide whether they can
/// implement those traits.
///
/// # Safety invariant
///
/// When `binding` is `Some(b)`:
///
/// 1. The slot holds a live value of the type identified by `b.token`, which
///    is the type `b.table` was created for.
/// 2. The value is inline when `P` fits `b.table.layout()`. Otherwise the
///    slot's heap pointer is active and points to a block allocated from
///    `P::Allocator` with that layout.
///
/// When `binding` is `None`, the slot holds neither a value nor a block.
pub struct RawValue<P: StoragePolicy> {
    /// Inline bytes or the heap pointer.
    slot: Slot<P::Buffer>,
    /// Table and identity of the held value; `None` when empty.
    binding: Option<Binding>,
    _policy: PhantomData<fn() -> P>,
}

impl<P: StoragePolicy> RawValue<P> {
    /// Creates an empty value.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            slot: Slot::uninit(),
            binding: None,
            _policy: PhantomData,
        }
    }

    /// Creates a value holding `value`, bound with the capabilities `K`.
    ///
    /// ```
    /// use polybox_internals::{
    ///     Placement, RawValue, capability::Cloneable, policy::DefaultPolicy,
    /// };
    ///
    /// let value = RawValue::<DefaultPolicy>::new::<_, Cloneable>(7u32);
    /// assert!(value.holds::<u32>());
    /// assert_eq!(value.placement(), Some(Placement::Inline));
    /// ```
    #[inline]
    pub fn new<T: 'static, K: Capabilities<T>>(value: T) -> Self {
        let mut this = Self::empty();
        this.write::<T, K>(value);
        this
    }

    /// Where a value of `layout` is stored under `P`.
    ///
    /// This does not consider whether `P` allows heap fallback.
    #[inline]
    pub const fn placement_for(layout: Layout) -> Placement {
        if descriptor::<P>().fits(layout) {
            Placement::Inline
        } else {
            Placement::Heap
        }
    }

    /// Destroys the current contents and binds `value` instead.
    #[inline]
    pub fn emplace<T: 'static, K: Capabilities<T>>(&mut self, value: T) {
        self.reset();
        self.write::<T, K>(value);
    }

    /// Destroys the current contents, then constructs a value with `f` and
    /// binds it.
    ///
    /// The previous value is gone before `f` runs. If `f` panics, `self` is
    /// left empty.
    #[inline]
    pub fn emplace_with<T: 'static, K: Capabilities<T>, F: FnOnce() -> T>(&mut self, f: F) {
        self.reset();
        let value = f();
        self.write::<T, K>(value);
    }

    /// Writes `value` into an empty slot and binds it.
    fn write<T: 'static, K: Capabilities<T>>(&mut self, value: T) {
        const {
            assert!(
                P::HEAP_FALLBACK || descriptor::<P>().fits(Layout::new::<T>()),
                "value does not fit the inline storage of a policy without heap fallback"
            );
        }
        debug_assert!(self.binding.is_none());

        let table = K::operation_table();
        let layout = Layout::new::<T>();
        let dst = match Self::placement_for(layout) {
            Placement::Inline => self.slot.as_mut_ptr(),
            Placement::Heap => {
                let block = block::allocate::<P::Allocator>(layout);
                self.slot.set_heap(block);
                block
            }
        };
        // SAFETY:
        // 1. An inline destination is the slot, which is sized and aligned at
        //    least like `P::Buffer`, which fits `T`. A heap destination was
        //    just allocated with the layout of `T`.
        // 2. The slot is empty, so the destination holds no live value.
        unsafe { slot::place(dst, value) };
        self.binding = Some(Binding {
            table,
            token: TypeToken::of::<T>(),
        });
    }

    /// Destroys the held value and releases its block, leaving `self` empty.
    ///
    /// Does nothing when already empty.
    pub fn reset(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        let layout = binding.table.layout();
        match Self::placement_for(layout) {
            Placement::Inline => {
                let ptr = self.slot.as_mut_ptr();
                // SAFETY: The slot held a live value described by the table,
                // which is no longer bound and is not used again.
                unsafe { binding.table.destroy(ptr) };
            }
            Placement::Heap => {
                // SAFETY: The value was bound and heap-placed, so the heap
                // variant of the slot is active.
                let block = unsafe { self.slot.heap() };
                // SAFETY: The block came from `P::Allocator` with this layout
                // and was owned by the binding that was just removed.
                let guard = unsafe { BlockGuard::<P::Allocator>::adopt(block, layout) };
                // SAFETY: The block holds a live value described by the table,
                // which is no longer bound and is not used again.
                unsafe { binding.table.destroy(guard.as_ptr()) };
                drop(guard);
            }
        }
    }

    /// Returns `true` if no value is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.binding.is_none()
    }

    /// Returns `true` if the held value is a `T`.
    #[inline]
    pub fn holds<T: 'static>(&self) -> bool {
        self.binding.is_some_and(|binding| binding.token.is::<T>())
    }

    /// Identity of the held type, or `None` when empty.
    #[inline]
    pub fn type_token(&self) -> Option<TypeToken> {
        self.binding.map(|binding| binding.token)
    }

    /// Name of the held type, or `None` when empty.
    #[inline]
    pub fn type_name(&self) -> Option<&'static str> {
        self.binding.map(|binding| binding.token.type_name())
    }

    /// Operation table of the held value, or `None` when empty.
    #[inline]
    pub fn table(&self) -> Option<&'static OperationTable> {
        self.binding.map(|binding| binding.table)
    }

    /// Placement of the held value, or `None` when empty.
    #[inline]
    pub fn placement(&self) -> Option<Placement> {
        self.binding.map(|binding| Self::placement_for(binding.table.layout()))
    }

    /// Returns `true` if a value is held and its table can copy it.
    #[inline]
    pub fn is_cloneable(&self) -> bool {
        self.binding.is_some_and(|binding| binding.table.is_cloneable())
    }

    /// Address of the slot.
    ///
    /// This is the context pointer handed to call targets; resolve it with
    /// [`inline_target`](crate::inline_target) or
    /// [`heap_target`](crate::heap_target) depending on the placement. The
    /// pointer stays valid until `self` is moved, mutated or dropped.
    #[inline]
    pub fn storage_ptr(&self) -> NonNull<Erased> {
        self.slot.as_ptr()
    }

    /// Address of the held value given its placement.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. A value is held and `placement` is its placement.
    #[inline]
    unsafe fn value_ptr(&self, placement: Placement) -> NonNull<Erased> {
        match placement {
            Placement::Inline => self.slot.as_ptr(),
            // SAFETY: A heap-placed value is held, so the heap variant of the
            // slot is active.
            Placement::Heap => unsafe { self.slot.heap() },
        }
    }

    /// Mutable variant of [`value_ptr`](Self::value_ptr).
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. A value is held and `placement` is its placement.
    #[inline]
    unsafe fn value_mut_ptr(&mut self, placement: Placement) -> NonNull<Erased> {
        match placement {
            Placement::Inline => self.slot.as_mut_ptr(),
            // SAFETY: A heap-placed value is held, so the heap variant of the
            // slot is active.
            Placement::Heap => unsafe { self.slot.heap() },
        }
    }

    /// Returns a reference to the held value if it is a `T`.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.holds::<T>() {
            // SAFETY: The held value is a `T`.
            Some(unsafe { self.downcast_ref_unchecked::<T>() })
        } else {
            None
        }
    }

    /// Returns a mutable reference to the held value if it is a `T`.
    #[inline]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if self.holds::<T>() {
            // SAFETY: The held value is a `T`.
            Some(unsafe { self.downcast_mut_unchecked::<T>() })
        } else {
            None
        }
    }

    /// Returns a reference to the held value without checking its type.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The held value is a `T`.
    #[inline]
    pub unsafe fn downcast_ref_unchecked<T: 'static>(&self) -> &T {
        debug_assert!(self.holds::<T>());
        let placement = Self::placement_for(Layout::new::<T>());
        // SAFETY: A `T` is held, so its placement follows from its layout.
        let ptr = unsafe { self.value_ptr(placement) };
        // SAFETY: The pointer refers to a live `T` that is borrowed through
        // `self`.
        unsafe { ptr.cast::<T>().as_ref() }
    }

    /// Returns a mutable reference to the held value without checking its
    /// type.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The held value is a `T`.
    #[inline]
    pub unsafe fn downcast_mut_unchecked<T: 'static>(&mut self) -> &mut T {
        debug_assert!(self.holds::<T>());
        let placement = Self::placement_for(Layout::new::<T>());
        // SAFETY: A `T` is held, so its placement follows from its layout.
        let ptr = unsafe { self.value_mut_ptr(placement) };
        // SAFETY: The pointer refers to a live `T` that is exclusively
        // borrowed through `self`.
        unsafe { ptr.cast::<T>().as_mut() }
    }

    /// Moves the held value out if it is a `T`, leaving `self` empty.
    ///
    /// Returns `None` and leaves `self` untouched otherwise.
    pub fn take_value<T: 'static>(&mut self) -> Option<T> {
        if !self.holds::<T>() {
            return None;
        }
        let binding = self.binding.take()?;
        let layout = binding.table.layout();
        let placement = Self::placement_for(layout);
        // SAFETY: A `T` with this placement was held until the binding was
        // removed above.
        let ptr = unsafe { self.value_mut_ptr(placement) };
        // SAFETY: The pointer refers to a live `T` which is no longer bound,
        // so it is read exactly once.
        let value = unsafe { ptr.cast::<T>().read() };
        if placement == Placement::Heap {
            // SAFETY: The block came from `P::Allocator` with this layout and
            // its value was moved out.
            unsafe { block::deallocate::<P::Allocator>(ptr, layout) };
        }
        Some(value)
    }

    /// Creates an independent copy of `self`.
    ///
    /// An empty value copies to an empty value. Returns `None` when the held
    /// value was bound without a copy operation. If the value's `Clone`
    /// implementation panics, no block is leaked.
    pub fn try_clone(&self) -> Option<Self> {
        let mut out = Self::empty();
        let Some(binding) = self.binding else {
            return Some(out);
        };
        let table = binding.table;
        if !table.is_cloneable() {
            return None;
        }
        let layout = table.layout();
        let placement = Self::placement_for(layout);
        // SAFETY: A value with this placement is held.
        let src = unsafe { self.value_ptr(placement) };
        match placement {
            Placement::Inline => {
                let dst = out.slot.as_mut_ptr();
                // SAFETY: The source is live and described by the table. The
                // destination is an empty slot of the same policy.
                unsafe { table.clone_into(src, dst) };
            }
            Placement::Heap => {
                let guard = BlockGuard::<P::Allocator>::allocate(layout);
                // SAFETY: The source is live and described by the table. The
                // destination is a fresh block with the table's layout.
                unsafe { table.clone_into(src, guard.as_ptr()) };
                out.slot.set_heap(guard.release());
            }
        }
        out.binding = Some(binding);
        Some(out)
    }

    /// Moves the contents of `self` into a new value, leaving `self` empty.
    ///
    /// A heap-placed value keeps its block.
    pub fn take(&mut self) -> Self {
        let mut out = Self::empty();
        let Some(binding) = self.binding.take() else {
            return out;
        };
        match Self::placement_for(binding.table.layout()) {
            Placement::Inline => {
                let src = self.slot.as_mut_ptr();
                let dst = out.slot.as_mut_ptr();
                // SAFETY: The source slot held a live value described by the
                // table, which is no longer bound there. The destination is
                // an empty slot of the same policy.
                unsafe { binding.table.relocate(src, dst) };
            }
            Placement::Heap => {
                // SAFETY: The value was heap-placed, so the heap variant of
                // the slot is active.
                let block = unsafe { self.slot.heap() };
                out.slot.set_heap(block);
            }
        }
        out.binding = Some(binding);
        out
    }

    /// Exchanges the contents of `self` and `other`.
    ///
    /// When both hold the same type inline, the values are swapped in place
    /// through the table.
    pub fn swap(&mut self, other: &mut Self) {
        if let (Some(ours), Some(theirs)) = (self.binding, other.binding)
            && ours.token == theirs.token
        {
            match Self::placement_for(ours.table.layout()) {
                Placement::Inline => {
                    let a = self.slot.as_mut_ptr();
                    let b = other.slot.as_mut_ptr();
                    // SAFETY: Both slots hold a live value of the type the
                    // table was created for, and they are distinct.
                    unsafe { ours.table.swap(a, b) };
                }
                Placement::Heap => {
                    // SAFETY: Our value is heap-placed, so the heap variant of
                    // our slot is active.
                    let a = unsafe { self.slot.heap() };
                    // SAFETY: Same type, so the other value is heap-placed too.
                    let b = unsafe { other.slot.heap() };
                    self.slot.set_heap(b);
                    other.slot.set_heap(a);
                }
            }
            core::mem::swap(&mut self.binding, &mut other.binding);
            return;
        }
        core::mem::swap(self, other);
    }

    /// Moves the held value into a value stored under another policy `Q`.
    ///
    /// The value is placed the way `Q` places it: inline when it fits `Q`,
    /// otherwise in a block from `Q::Allocator`. A heap block is handed over
    /// without copying when both policies use the same allocator type and the
    /// value stays on the heap.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value does not fit `Q` and `Q` has no
    /// heap fallback.
    pub fn relocate_into<Q: StoragePolicy>(mut self) -> Result<RawValue<Q>, Self> {
        let mut out = RawValue::<Q>::empty();
        let Some(binding) = self.binding else {
            return Ok(out);
        };
        let layout = binding.table.layout();
        let from = Self::placement_for(layout);
        let to = RawValue::<Q>::placement_for(layout);
        if to == Placement::Heap && !Q::HEAP_FALLBACK {
            return Err(self);
        }
        let same_allocator = TypeId::of::<P::Allocator>() == TypeId::of::<Q::Allocator>();

        // SAFETY: A value with placement `from` is held.
        let src = unsafe { self.value_mut_ptr(from) };
        let keeps_block = from == Placement::Heap && to == Placement::Heap && same_allocator;
        if keeps_block {
            out.slot.set_heap(src);
        } else {
            let dst = match to {
                Placement::Inline => out.slot.as_mut_ptr(),
                Placement::Heap => {
                    let block = block::allocate::<Q::Allocator>(layout);
                    out.slot.set_heap(block);
                    block
                }
            };
            // SAFETY: The source is live and described by the table. The
            // destination is empty and fits the layout: `Q` fits it inline,
            // or the block was allocated with it.
            unsafe { binding.table.relocate(src, dst) };
            if from == Placement::Heap {
                // SAFETY: The block came from `P::Allocator` with this layout
                // and its value was relocated out.
                unsafe { block::deallocate::<P::Allocator>(src, layout) };
            }
        }
        self.binding = None;
        out.binding = Some(binding);
        Ok(out)
    }
}

impl<P: StoragePolicy> Default for RawValue<P> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<P: StoragePolicy> Drop for RawValue<P> {
    #[inline]
    fn drop(&mut self) {
        self.reset();
    }
}

impl<P: StoragePolicy> core::fmt::Debug for RawValue<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.binding {
            None => f.write_str("RawValue(<empty>)"),
            Some(binding) => f
                .debug_struct("RawValue")
                .field("type_name", &binding.token.type_name())
                .field("placement", &Self::placement_for(binding.table.layout()))
                .finish(),
        }
    }
}

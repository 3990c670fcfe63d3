use core::{any::type_name, fmt};

use polybox_internals::{
    Placement, RawValue, TypeToken,
    policy::{DefaultPolicy, StoragePolicy, descriptor},
};

use crate::{
    ContainerError,
    markers::{Capabilities, Cloneable, MoveOnly, ObjectMarkerFor, SendSync, Trivial},
};

/// FIXME: Once rust-lang/rust#132922 gets resolved, we can make the `raw` field
/// an unsafe field and remove this module.
mod limit_field_access {
    use core::marker::PhantomData;

    use polybox_internals::{RawValue, policy::{DefaultPolicy, StoragePolicy}};

    use crate::markers::SendSync;

    /// A type-erased container holding at most one value, stored inline when
    /// it fits.
    ///
    /// [`PolyBox`] owns its value like a [`Box<dyn Any>`](alloc::boxed::Box)
    /// would, but values whose size and alignment fit the storage policy are
    /// kept inside the container itself and never allocate. Every lifecycle
    /// operation goes through a table of function pointers selected when the
    /// value was bound.
    ///
    /// # Type Parameters
    ///
    /// - **Policy (`P`)**: Inline buffer, heap fallback and allocator, see
    ///   [`policy`](crate::policy). Defaults to [`DefaultPolicy`]: 24 bytes
    ///   aligned to 8, spilling to the global allocator.
    /// - **Thread Safety (`T`)**: Controls which values are accepted
    ///   - [`SendSync`]: Only `Send + Sync` values; the container is
    ///     `Send + Sync` (default)
    ///   - [`Local`]: Any `'static` value; the container stays on its thread
    ///
    /// # Moves
    ///
    /// A by-value move of a [`PolyBox`] relocates it: the compiler forbids
    /// any use of the source afterwards. The non-destructive moves
    /// [`take`](PolyBox::take) and [`assign_from`](PolyBox::assign_from)
    /// always leave the source empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use polybox::PolyBox;
    ///
    /// let mut value: PolyBox = PolyBox::new(42i32);
    /// assert_eq!(value.get::<i32>(), Ok(&42));
    ///
    /// value.emplace(String::from("hello"));
    /// assert!(!value.holds::<i32>());
    /// assert_eq!(value.get::<String>().map(String::as_str), Ok("hello"));
    /// ```
    ///
    /// [`Local`]: crate::markers::Local
    pub struct PolyBox<P: StoragePolicy = DefaultPolicy, ThreadSafety: 'static = SendSync> {
        /// # Safety
        ///
        /// The following safety invariants are guaranteed to be upheld as long
        /// as this struct exists:
        ///
        /// 1. `ThreadSafety` must either be `SendSync` or `Local`.
        /// 2. If `ThreadSafety = SendSync`: The held value, if any, must be
        ///    `Send + Sync`.
        raw: RawValue<P>,
        _thread_safety: PhantomData<ThreadSafety>,
    }

    impl<P: StoragePolicy, T> PolyBox<P, T> {
        /// Creates a new [`PolyBox`] from a [`RawValue`].
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. `T` must either be `SendSync` or `Local`.
        /// 2. If `T = SendSync`: The held value, if any, must be `Send + Sync`.
        #[must_use]
        pub(crate) const unsafe fn from_raw(raw: RawValue<P>) -> Self {
            // SAFETY: We must uphold the safety invariants of the raw field:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            Self {
                raw,
                _thread_safety: PhantomData,
            }
        }

        /// Consumes the [`PolyBox`] and returns the inner [`RawValue`].
        #[must_use]
        pub(crate) fn into_raw(self) -> RawValue<P> {
            // SAFETY: We are destroying `self`, so we no longer
            // need to uphold any safety invariants.
            self.raw
        }

        /// Returns a reference to the inner [`RawValue`].
        #[must_use]
        pub(crate) fn as_raw(&self) -> &RawValue<P> {
            // SAFETY: Trivially upheld, as no mutation occurs.
            &self.raw
        }

        /// Returns a mutable reference to the inner [`RawValue`].
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. If `T = SendSync`, no value that is not `Send + Sync` is bound
        ///    through this reference.
        #[must_use]
        pub(crate) unsafe fn as_raw_mut(&mut self) -> &mut RawValue<P> {
            // SAFETY: We must uphold the safety invariants of the raw field:
            // 1. Upheld as the type parameters do not change.
            // 2. Guaranteed by the caller.
            &mut self.raw
        }
    }
}

pub use limit_field_access::PolyBox;

impl<P: StoragePolicy, T> PolyBox<P, T> {
    /// Creates an empty container.
    ///
    /// ```
    /// use polybox::PolyBox;
    ///
    /// let value: PolyBox = PolyBox::empty();
    /// assert!(value.is_empty());
    /// ```
    #[must_use]
    pub const fn empty() -> Self {
        // SAFETY:
        // 1. Only `SendSync` and `Local` are used with this type by the
        //    constructors of this crate.
        // 2. Nothing is held.
        unsafe { Self::from_raw(RawValue::empty()) }
    }

    /// Creates a container holding `value`, keeping its [`Clone`]
    /// implementation.
    ///
    /// Values that fit the policy are stored inline. If the policy has no
    /// heap fallback and the value does not fit, this fails to compile.
    ///
    /// ```
    /// use polybox::{PolyBox, policy::InlineOrHeap, space::A8};
    ///
    /// let small: PolyBox<InlineOrHeap<A8<16>>> = PolyBox::new(42i32);
    /// assert!(small.is_inline());
    ///
    /// let large: PolyBox<InlineOrHeap<A8<16>>> = PolyBox::new([0u64; 4]);
    /// assert!(large.is_heap());
    /// ```
    #[must_use]
    pub fn new<V>(value: V) -> Self
    where
        V: Clone + ObjectMarkerFor<T>,
    {
        Self::with_capabilities::<Cloneable, V>(value)
    }

    /// Creates a container holding `value` without a copy operation.
    ///
    /// [`try_clone`](Self::try_clone) on the container fails with
    /// [`ContainerError::NotCopyable`].
    #[must_use]
    pub fn new_move_only<V>(value: V) -> Self
    where
        V: ObjectMarkerFor<T>,
    {
        Self::with_capabilities::<MoveOnly, V>(value)
    }

    /// Creates a container holding a plain-bytes `value`.
    ///
    /// The container shares its operation table with every other [`Copy`]
    /// type of the same size and alignment, up to
    /// [`Shape::MAX_SHARED_SIZE`](crate::Shape::MAX_SHARED_SIZE) bytes.
    #[must_use]
    pub fn new_trivial<V>(value: V) -> Self
    where
        V: Copy + ObjectMarkerFor<T>,
    {
        Self::with_capabilities::<Trivial, V>(value)
    }

    /// Creates a container holding `value`, bound with the capability marker
    /// `K`.
    ///
    /// ```
    /// use polybox::{PolyBox, markers::MoveOnly};
    ///
    /// let value: PolyBox = PolyBox::with_capabilities::<MoveOnly, _>(vec![1, 2, 3]);
    /// assert!(!value.is_cloneable());
    /// ```
    #[must_use]
    pub fn with_capabilities<K, V>(value: V) -> Self
    where
        K: Capabilities<V>,
        V: ObjectMarkerFor<T>,
    {
        // SAFETY:
        // 1. Only `SendSync` and `Local` implement the thread-safety marker
        //    bounds of `ObjectMarkerFor`.
        // 2. If `T = SendSync`, `V: ObjectMarkerFor<SendSync>` implies
        //    `V: Send + Sync`.
        unsafe { Self::from_raw(RawValue::new::<V, K>(value)) }
    }

    /// Destroys the held value, then stores `value`, keeping its [`Clone`]
    /// implementation.
    ///
    /// `value` already exists when this is called. To construct the new value
    /// only after the old one is destroyed, use
    /// [`emplace_with`](Self::emplace_with).
    pub fn emplace<V>(&mut self, value: V)
    where
        V: Clone + ObjectMarkerFor<T>,
    {
        self.emplace_with_capabilities::<Cloneable, V>(value);
    }

    /// Destroys the held value, then stores `value` without a copy operation.
    pub fn emplace_move_only<V>(&mut self, value: V)
    where
        V: ObjectMarkerFor<T>,
    {
        self.emplace_with_capabilities::<MoveOnly, V>(value);
    }

    /// Destroys the held value, then stores a plain-bytes `value`.
    pub fn emplace_trivial<V>(&mut self, value: V)
    where
        V: Copy + ObjectMarkerFor<T>,
    {
        self.emplace_with_capabilities::<Trivial, V>(value);
    }

    /// Destroys the held value, then stores `value` bound with the
    /// capability marker `K`.
    pub fn emplace_with_capabilities<K, V>(&mut self, value: V)
    where
        K: Capabilities<V>,
        V: ObjectMarkerFor<T>,
    {
        // SAFETY:
        // 1. `V: ObjectMarkerFor<T>`, so if `T = SendSync` the bound value is
        //    `Send + Sync`.
        let raw = unsafe { self.as_raw_mut() };
        raw.emplace::<V, K>(value);
    }

    /// Destroys the held value, then constructs a new one with `f`.
    ///
    /// The old value is gone before `f` runs, so `f` may reuse resources it
    /// released. If `f` panics, the container is left empty.
    ///
    /// ```
    /// use polybox::PolyBox;
    ///
    /// let mut value: PolyBox = PolyBox::new(1u8);
    /// value.emplace_with(|| String::from("built in place"));
    /// assert!(value.holds::<String>());
    /// ```
    pub fn emplace_with<V, F>(&mut self, f: F)
    where
        V: Clone + ObjectMarkerFor<T>,
        F: FnOnce() -> V,
    {
        self.emplace_with_capabilities_with::<Cloneable, V, F>(f);
    }

    /// Like [`emplace_with`](Self::emplace_with), without a copy operation.
    pub fn emplace_move_only_with<V, F>(&mut self, f: F)
    where
        V: ObjectMarkerFor<T>,
        F: FnOnce() -> V,
    {
        self.emplace_with_capabilities_with::<MoveOnly, V, F>(f);
    }

    /// Like [`emplace_with`](Self::emplace_with), for a plain-bytes value.
    pub fn emplace_trivial_with<V, F>(&mut self, f: F)
    where
        V: Copy + ObjectMarkerFor<T>,
        F: FnOnce() -> V,
    {
        self.emplace_with_capabilities_with::<Trivial, V, F>(f);
    }

    /// Destroys the held value, then constructs a new one with `f` and binds
    /// it with the capability marker `K`.
    ///
    /// If `f` panics, the container is left empty.
    ///
    /// ```
    /// use polybox::{PolyBox, markers::MoveOnly};
    ///
    /// let mut value: PolyBox = PolyBox::new(1u8);
    /// value.emplace_with_capabilities_with::<MoveOnly, _, _>(|| vec![1u8, 2]);
    /// assert!(!value.is_cloneable());
    /// ```
    pub fn emplace_with_capabilities_with<K, V, F>(&mut self, f: F)
    where
        K: Capabilities<V>,
        V: ObjectMarkerFor<T>,
        F: FnOnce() -> V,
    {
        // SAFETY:
        // 1. `V: ObjectMarkerFor<T>`, so if `T = SendSync` the bound value is
        //    `Send + Sync`.
        let raw = unsafe { self.as_raw_mut() };
        raw.emplace_with::<V, K, F>(f);
    }

    /// Destroys the held value, leaving the container empty.
    pub fn reset(&mut self) {
        // SAFETY:
        // 1. Nothing is bound.
        let raw = unsafe { self.as_raw_mut() };
        raw.reset();
    }

    /// Creates an independent copy of the container.
    ///
    /// An empty container copies to an empty container.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotCopyable`] if the held value was bound
    /// without a copy operation.
    ///
    /// ```
    /// use polybox::{ContainerError, PolyBox};
    ///
    /// let value: PolyBox = PolyBox::new(vec![1, 2]);
    /// let copy = value.try_clone().unwrap();
    /// assert_eq!(copy.get::<Vec<i32>>(), Ok(&vec![1, 2]));
    ///
    /// let unique: PolyBox = PolyBox::new_move_only(vec![1, 2]);
    /// assert!(matches!(
    ///     unique.try_clone(),
    ///     Err(ContainerError::NotCopyable { .. })
    /// ));
    /// ```
    pub fn try_clone(&self) -> Result<Self, ContainerError> {
        match self.as_raw().try_clone() {
            // SAFETY:
            // 1. The type parameters do not change.
            // 2. The copy has the same type as our value, which satisfies the
            //    invariant.
            Some(raw) => Ok(unsafe { Self::from_raw(raw) }),
            None => Err(ContainerError::NotCopyable {
                type_name: self.type_name().unwrap_or_default(),
            }),
        }
    }

    /// Replaces the contents of `self` with a copy of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotCopyable`] if the value in `source` was
    /// bound without a copy operation. `self` is unchanged in that case.
    pub fn try_clone_from(&mut self, source: &Self) -> Result<(), ContainerError> {
        let copy = source.try_clone()?;
        *self = copy;
        Ok(())
    }

    /// Moves the value out into a new container, leaving `self` empty.
    ///
    /// ```
    /// use polybox::PolyBox;
    ///
    /// let mut source: PolyBox = PolyBox::new(3u16);
    /// let target = source.take();
    /// assert!(source.is_empty());
    /// assert_eq!(target.get::<u16>(), Ok(&3));
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        // SAFETY:
        // 1. Nothing is bound; the value is moved out.
        let raw = unsafe { self.as_raw_mut() };
        let taken = raw.take();
        // SAFETY:
        // 1. The type parameters do not change.
        // 2. The value came from a container with the same marker.
        unsafe { Self::from_raw(taken) }
    }

    /// Destroys the value of `self`, then moves the value of `source` into
    /// it. `source` is left empty.
    pub fn assign_from(&mut self, source: &mut Self) {
        let taken = source.take();
        *self = taken;
    }

    /// Moves the container into one with another storage policy.
    ///
    /// # Errors
    ///
    /// Fails with [`ContainerError::StorageTooSmall`] if the value does not
    /// fit the inline storage of `Q` and `Q` has no heap fallback. The
    /// container is handed back intact together with the error.
    ///
    /// ```
    /// use polybox::{
    ///     ContainerError, PolyBox,
    ///     policy::{DefaultPolicy, InlineOnly},
    ///     space::A8,
    /// };
    ///
    /// let value: PolyBox<DefaultPolicy> = PolyBox::new([7u8; 20]);
    /// let (value, err) = value.relocate_into::<InlineOnly<A8<16>>>().unwrap_err();
    /// assert!(matches!(err, ContainerError::StorageTooSmall { needed_size: 20, .. }));
    ///
    /// let moved = value.relocate_into::<InlineOnly<A8<32>>>().unwrap();
    /// assert!(moved.is_inline());
    /// ```
    pub fn relocate_into<Q: StoragePolicy>(self) -> Result<PolyBox<Q, T>, (Self, ContainerError)> {
        match self.into_raw().relocate_into::<Q>() {
            // SAFETY:
            // 1. The thread-safety marker does not change.
            // 2. The value came from a container with the same marker.
            Ok(raw) => Ok(unsafe { PolyBox::from_raw(raw) }),
            Err(raw) => {
                let layout = raw.table().map(|table| table.layout());
                let target = descriptor::<Q>();
                let err = ContainerError::StorageTooSmall {
                    needed_size: layout.map_or(0, |layout| layout.size()),
                    needed_align: layout.map_or(1, |layout| layout.align()),
                    capacity: target.capacity(),
                    alignment: target.alignment(),
                };
                // SAFETY:
                // 1. The type parameters do not change.
                // 2. The value is unchanged.
                Err((unsafe { Self::from_raw(raw) }, err))
            }
        }
    }

    /// Exchanges the contents of two containers.
    pub fn swap(&mut self, other: &mut Self) {
        // SAFETY:
        // 1. Both containers have the same marker, so each value is
        //    acceptable in the other.
        let ours = unsafe { self.as_raw_mut() };
        // SAFETY: See above.
        let theirs = unsafe { other.as_raw_mut() };
        ours.swap(theirs);
    }

    /// Returns `true` if the container holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_raw().is_empty()
    }

    /// Returns `true` if the held value is a `U`.
    #[must_use]
    pub fn holds<U: 'static>(&self) -> bool {
        self.as_raw().holds::<U>()
    }

    /// Returns the identity of the held type, or `None` when empty.
    #[must_use]
    pub fn type_token(&self) -> Option<TypeToken> {
        self.as_raw().type_token()
    }

    /// Returns the name of the held type, or `None` when empty.
    #[must_use]
    pub fn type_name(&self) -> Option<&'static str> {
        self.as_raw().type_name()
    }

    /// Returns where the held value is stored, or `None` when empty.
    #[must_use]
    pub fn placement(&self) -> Option<Placement> {
        self.as_raw().placement()
    }

    /// Returns `true` if a value is held inside the container.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.placement() == Some(Placement::Inline)
    }

    /// Returns `true` if a value is held in a heap block.
    #[must_use]
    pub fn is_heap(&self) -> bool {
        self.placement() == Some(Placement::Heap)
    }

    /// Returns `true` if a value is held and can be copied with
    /// [`try_clone`](Self::try_clone).
    #[must_use]
    pub fn is_cloneable(&self) -> bool {
        self.as_raw().is_cloneable()
    }

    /// Returns a reference to the held value.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::Empty`] if nothing is held.
    /// - [`ContainerError::TypeMismatch`] if the held value is not a `U`.
    pub fn get<U: 'static>(&self) -> Result<&U, ContainerError> {
        self.as_raw()
            .downcast_ref::<U>()
            .ok_or_else(|| self.lookup_error::<U>())
    }

    /// Returns a mutable reference to the held value.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::Empty`] if nothing is held.
    /// - [`ContainerError::TypeMismatch`] if the held value is not a `U`.
    pub fn get_mut<U: 'static>(&mut self) -> Result<&mut U, ContainerError> {
        let err = self.lookup_error::<U>();
        // SAFETY:
        // 1. Mutating through `&mut U` cannot change the type of the value.
        let raw = unsafe { self.as_raw_mut() };
        raw.downcast_mut::<U>().ok_or(err)
    }

    /// Returns a reference to the held value if it is a `U`.
    #[must_use]
    pub fn try_get<U: 'static>(&self) -> Option<&U> {
        self.as_raw().downcast_ref::<U>()
    }

    /// Returns a mutable reference to the held value if it is a `U`.
    #[must_use]
    pub fn try_get_mut<U: 'static>(&mut self) -> Option<&mut U> {
        // SAFETY:
        // 1. Mutating through `&mut U` cannot change the type of the value.
        let raw = unsafe { self.as_raw_mut() };
        raw.downcast_mut::<U>()
    }

    /// Moves the held value out of the container.
    ///
    /// # Errors
    ///
    /// Fails with [`ContainerError::Empty`] or
    /// [`ContainerError::TypeMismatch`], handing the container back.
    ///
    /// ```
    /// use polybox::PolyBox;
    ///
    /// let value: PolyBox = PolyBox::new(String::from("out"));
    /// let (value, _) = value.into_inner::<u8>().unwrap_err();
    /// assert_eq!(value.into_inner::<String>().unwrap(), "out");
    /// ```
    pub fn into_inner<U: 'static>(mut self) -> Result<U, (Self, ContainerError)> {
        let err = self.lookup_error::<U>();
        // SAFETY:
        // 1. The value is moved out and nothing is bound.
        let raw = unsafe { self.as_raw_mut() };
        match raw.take_value::<U>() {
            Some(value) => Ok(value),
            None => Err((self, err)),
        }
    }

    fn lookup_error<U: 'static>(&self) -> ContainerError {
        let expected = type_name::<U>();
        match self.type_name() {
            Some(found) => ContainerError::TypeMismatch { expected, found },
            None => ContainerError::Empty { expected },
        }
    }
}

impl<P: StoragePolicy, T> Default for PolyBox<P, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P: StoragePolicy, T> fmt::Debug for PolyBox<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.type_name(), self.placement()) {
            (Some(type_name), Some(placement)) => f
                .debug_struct("PolyBox")
                .field("type_name", &type_name)
                .field("placement", &placement)
                .finish(),
            _ => f.write_str("PolyBox(<empty>)"),
        }
    }
}

// SAFETY: The `SendSync` marker indicates that the held value is
// `Send`+`Sync`. Therefore it is safe to implement `Send`+`Sync` for the
// container itself.
unsafe impl<P: StoragePolicy> Send for PolyBox<P, SendSync> {}

// SAFETY: The `SendSync` marker indicates that the held value is
// `Send`+`Sync`. Therefore it is safe to implement `Send`+`Sync` for the
// container itself.
unsafe impl<P: StoragePolicy> Sync for PolyBox<P, SendSync> {}

#[cfg(test)]
mod tests {
    use alloc::{format, rc::Rc, string::String, vec};

    use polybox_internals::{policy::InlineOrHeap, space::A8};

    use super::*;
    use crate::markers::Local;

    #[allow(dead_code)]
    struct NonSend(*const ());
    static_assertions::assert_not_impl_any!(NonSend: Send, Sync);

    #[test]
    fn test_poly_box_send_sync() {
        static_assertions::assert_impl_all!(PolyBox<DefaultPolicy, SendSync>: Send, Sync);
        static_assertions::assert_impl_all!(PolyBox<InlineOrHeap<A8<8>>, SendSync>: Send, Sync);
        static_assertions::assert_not_impl_any!(PolyBox<DefaultPolicy, Local>: Send, Sync);
        static_assertions::assert_not_impl_any!(PolyBox<DefaultPolicy>: Copy, Clone);
    }

    #[test]
    fn test_poly_box_size_is_independent_of_value() {
        // Inline buffer, plus the table and token pointers.
        assert_eq!(
            size_of::<PolyBox<DefaultPolicy>>(),
            24 + 2 * size_of::<usize>()
        );
        assert_eq!(
            size_of::<PolyBox<InlineOrHeap<A8<64>>>>(),
            64 + 2 * size_of::<usize>()
        );
    }

    #[test]
    fn test_lookup_errors() {
        let mut value: PolyBox = PolyBox::empty();
        assert_eq!(value.get::<u8>(), Err(ContainerError::Empty { expected: "u8" }));
        value.emplace(1u16);
        assert_eq!(
            value.get_mut::<u8>(),
            Err(ContainerError::TypeMismatch {
                expected: "u8",
                found: "u16"
            })
        );
        *value.get_mut::<u16>().unwrap() += 1;
        assert_eq!(value.try_get::<u16>(), Some(&2));
    }

    #[test]
    fn test_not_copyable_names_type() {
        let value: PolyBox = PolyBox::new_move_only(5u32);
        assert_eq!(
            value.try_clone().err(),
            Some(ContainerError::NotCopyable { type_name: "u32" })
        );

        let mut target: PolyBox = PolyBox::new(1u8);
        assert!(target.try_clone_from(&value).is_err());
        assert_eq!(target.get::<u8>(), Ok(&1));
    }

    #[test]
    fn test_assign_from_leaves_source_empty() {
        let tracker = Rc::new(());
        let mut target: PolyBox<DefaultPolicy, Local> = PolyBox::new(tracker.clone());
        let mut source: PolyBox<DefaultPolicy, Local> = PolyBox::new(vec![1, 2, 3]);
        target.assign_from(&mut source);
        assert!(source.is_empty());
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert_eq!(target.get::<alloc::vec::Vec<i32>>().map(|v| v.len()), Ok(3));
    }

    #[test]
    fn test_debug_hides_value() {
        let value: PolyBox = PolyBox::new(String::from("secret"));
        let text = format!("{value:?}");
        assert!(text.contains("String"));
        assert!(text.contains("Inline"));
        assert!(!text.contains("secret"));
        assert_eq!(format!("{:?}", PolyBox::<DefaultPolicy>::empty()), "PolyBox(<empty>)");
    }
}

//! The callable specialization of the container.

mod signature;

use core::{alloc::Layout, fmt};

use polybox_internals::{
    Placement, RawValue,
    policy::{DefaultPolicy, StoragePolicy},
};

pub use self::signature::{CallTarget, Signature};
use crate::{
    ContainerError,
    markers::{Capabilities, Cloneable, MoveOnly, ObjectMarkerFor, SendSync, Trivial},
};

/// FIXME: Once rust-lang/rust#132922 gets resolved, we can make the fields
/// unsafe fields and remove this module.
mod limit_field_access {
    use core::marker::PhantomData;

    use polybox_internals::{RawValue, policy::{DefaultPolicy, StoragePolicy}};

    use super::Signature;
    use crate::markers::SendSync;

    /// A type-erased callable with the signature `S`, stored inline when it
    /// fits.
    ///
    /// The call target (a closure, function item or function pointer) is
    /// stored like the value of a [`PolyBox`](crate::PolyBox). When it is
    /// bound, the trampoline for its type and placement is resolved once, so
    /// that [`call`](PolyFn::call) is a single indirect call with no check
    /// on the contents.
    ///
    /// # Signatures
    ///
    /// `S` is a function pointer type like `fn(u32, &'static str) -> bool`
    /// with up to eight arguments. Arguments are forwarded by value in
    /// order. Targets are called through `&self`, so they implement [`Fn`].
    /// Closure parameters need type annotations, since the signature only
    /// reaches the closure through the [`CallTarget`](crate::CallTarget)
    /// bound.
    ///
    /// To call a method on some instance, prefer a plain function taking the
    /// instance as its first argument over capturing the instance in the
    /// target:
    ///
    /// ```
    /// use std::sync::atomic::{AtomicU32, Ordering};
    ///
    /// use polybox::PolyFn;
    ///
    /// struct Counter(AtomicU32);
    ///
    /// fn tick(counter: &Counter, step: u32) -> u32 {
    ///     counter.0.fetch_add(step, Ordering::Relaxed) + step
    /// }
    ///
    /// static COUNTER: Counter = Counter(AtomicU32::new(0));
    ///
    /// let on_tick: PolyFn<fn(&'static Counter, u32) -> u32> = PolyFn::new(tick);
    /// assert_eq!(on_tick.call(&COUNTER, 2), 2);
    /// assert_eq!(on_tick.call(&COUNTER, 3), 5);
    /// ```
    ///
    /// # Empty callables
    ///
    /// An empty [`PolyFn`] is bound to a trampoline that panics.
    /// [`try_call`](PolyFn::try_call) checks for emptiness first and returns
    /// [`ContainerError::EmptyInvocation`](crate::ContainerError::EmptyInvocation)
    /// instead.
    ///
    /// ```
    /// use polybox::{ContainerError, PolyFn};
    ///
    /// let mut add: PolyFn<fn(i32, i32) -> i32> = PolyFn::empty();
    /// assert_eq!(add.try_call(1, 2), Err(ContainerError::EmptyInvocation));
    ///
    /// add.set(|a: i32, b: i32| a + b);
    /// assert_eq!(add.call(1, 2), 3);
    /// ```
    pub struct PolyFn<
        S: Signature,
        P: StoragePolicy = DefaultPolicy,
        ThreadSafety: 'static = SendSync,
    > {
        /// # Safety
        ///
        /// The following safety invariants are guaranteed to be upheld as long
        /// as this struct exists:
        ///
        /// 1. `ThreadSafety` must either be `SendSync` or `Local`.
        /// 2. If `ThreadSafety = SendSync`: The held target, if any, must be
        ///    `Send + Sync`.
        /// 3. If `raw` is empty, `trampoline` is `S::EMPTY`.
        /// 4. If `raw` holds a target of type `F`, `trampoline` is
        ///    `F::INLINE` or `F::HEAP` from `CallTarget<S>`, matching the
        ///    placement of the target.
        raw: RawValue<P>,
        trampoline: S::Trampoline,
        _thread_safety: PhantomData<ThreadSafety>,
    }

    impl<S: Signature, P: StoragePolicy, T> PolyFn<S, P, T> {
        /// Creates a new [`PolyFn`] from its parts.
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. `T` must either be `SendSync` or `Local`.
        /// 2. If `T = SendSync`: The held target, if any, must be
        ///    `Send + Sync`.
        /// 3. `trampoline` matches the contents of `raw` as described by the
        ///    invariants of [`PolyFn`].
        #[must_use]
        pub(crate) const unsafe fn from_parts(raw: RawValue<P>, trampoline: S::Trampoline) -> Self {
            // SAFETY: We must uphold the safety invariants of the fields:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. Guaranteed by the caller
            // 4. Guaranteed by the caller
            Self {
                raw,
                trampoline,
                _thread_safety: PhantomData,
            }
        }

        /// Returns the raw target and the bound trampoline.
        #[must_use]
        pub(crate) fn parts(&self) -> (&RawValue<P>, S::Trampoline) {
            // SAFETY: Trivially upheld, as no mutation occurs.
            (&self.raw, self.trampoline)
        }

        /// Returns mutable references to the raw target and the trampoline.
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. If `T = SendSync`, no target that is not `Send + Sync` is bound
        ///    through this reference.
        /// 2. Before control returns to safe code that can observe `self`,
        ///    including by unwinding, the trampoline matches the contents of
        ///    the raw target again.
        #[must_use]
        pub(crate) unsafe fn parts_mut(&mut self) -> (&mut RawValue<P>, &mut S::Trampoline) {
            // SAFETY: We must uphold the safety invariants of the fields:
            // 1. Upheld as the type parameters do not change.
            // 2. Guaranteed by the caller.
            // 3. Guaranteed by the caller.
            // 4. Guaranteed by the caller.
            (&mut self.raw, &mut self.trampoline)
        }
    }
}

pub use limit_field_access::PolyFn;

impl<S: Signature, P: StoragePolicy, T> PolyFn<S, P, T> {
    /// Creates a callable with nothing bound.
    #[must_use]
    pub const fn empty() -> Self {
        // SAFETY:
        // 1. Only `SendSync` and `Local` are used with this type by the
        //    constructors of this crate.
        // 2. Nothing is held.
        // 3. The raw target is empty and the trampoline is `S::EMPTY`.
        // 4. Nothing is held.
        unsafe { Self::from_parts(RawValue::empty(), S::EMPTY) }
    }

    /// Creates a callable bound to `target`, keeping its [`Clone`]
    /// implementation.
    ///
    /// ```
    /// use polybox::PolyFn;
    ///
    /// let offset = 10;
    /// let shift: PolyFn<fn(i32) -> i32> = PolyFn::new(move |x: i32| x + offset);
    /// assert_eq!(shift.call(5), 15);
    /// assert!(shift.is_inline());
    /// ```
    #[must_use]
    pub fn new<F>(target: F) -> Self
    where
        F: CallTarget<S> + Clone + ObjectMarkerFor<T>,
    {
        Self::bind::<Cloneable, F>(target)
    }

    /// Creates a callable bound to `target` without a copy operation.
    #[must_use]
    pub fn new_move_only<F>(target: F) -> Self
    where
        F: CallTarget<S> + ObjectMarkerFor<T>,
    {
        Self::bind::<MoveOnly, F>(target)
    }

    /// Creates a callable bound to a plain-bytes `target`.
    #[must_use]
    pub fn new_trivial<F>(target: F) -> Self
    where
        F: CallTarget<S> + Copy + ObjectMarkerFor<T>,
    {
        Self::bind::<Trivial, F>(target)
    }

    fn bind<K, F>(target: F) -> Self
    where
        K: Capabilities<F>,
        F: CallTarget<S> + ObjectMarkerFor<T>,
    {
        let raw = RawValue::new::<F, K>(target);
        // SAFETY:
        // 1. Only `SendSync` and `Local` implement the thread-safety marker
        //    bounds of `ObjectMarkerFor`.
        // 2. If `T = SendSync`, `F: ObjectMarkerFor<SendSync>` implies
        //    `F: Send + Sync`.
        // 3. The raw target is not empty.
        // 4. The trampoline is chosen for `F` and its placement under `P`.
        unsafe { Self::from_parts(raw, trampoline_for::<S, P, F>()) }
    }

    /// Destroys the bound target, then binds `target`, keeping its [`Clone`]
    /// implementation.
    pub fn set<F>(&mut self, target: F)
    where
        F: CallTarget<S> + Clone + ObjectMarkerFor<T>,
    {
        self.rebind::<Cloneable, F>(target);
    }

    /// Destroys the bound target, then binds `target` without a copy
    /// operation.
    pub fn set_move_only<F>(&mut self, target: F)
    where
        F: CallTarget<S> + ObjectMarkerFor<T>,
    {
        self.rebind::<MoveOnly, F>(target);
    }

    /// Destroys the bound target, then binds a plain-bytes `target`.
    pub fn set_trivial<F>(&mut self, target: F)
    where
        F: CallTarget<S> + Copy + ObjectMarkerFor<T>,
    {
        self.rebind::<Trivial, F>(target);
    }

    fn rebind<K, F>(&mut self, target: F)
    where
        K: Capabilities<F>,
        F: CallTarget<S> + ObjectMarkerFor<T>,
    {
        self.reset();
        // SAFETY:
        // 1. `F: ObjectMarkerFor<T>`, so if `T = SendSync` the bound target is
        //    `Send + Sync`.
        // 2. The raw target is empty and bound to `S::EMPTY` while `emplace`
        //    runs; the matching trampoline is stored right after.
        let (raw, trampoline) = unsafe { self.parts_mut() };
        raw.emplace::<F, K>(target);
        *trampoline = trampoline_for::<S, P, F>();
    }

    /// Destroys the bound target, leaving the callable empty.
    pub fn reset(&mut self) {
        // SAFETY:
        // 1. Nothing is bound.
        // 2. The raw target is reset, then the trampoline is set to
        //    `S::EMPTY`; neither step can unwind into safe code observing a
        //    mismatch, since the empty trampoline never reads the target.
        let (raw, trampoline) = unsafe { self.parts_mut() };
        *trampoline = S::EMPTY;
        raw.reset();
    }

    /// Creates an independent copy of the callable.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotCopyable`] if the target was bound
    /// without a copy operation.
    pub fn try_clone(&self) -> Result<Self, ContainerError> {
        let (raw, trampoline) = self.parts();
        match raw.try_clone() {
            // SAFETY:
            // 1. The type parameters do not change.
            // 2. The copy has the same type as our target.
            // 3. An empty copy comes from an empty target, bound to `S::EMPTY`.
            // 4. The copy has the same type and policy as our target, so it has
            //    the same placement.
            Some(copy) => Ok(unsafe { Self::from_parts(copy, trampoline) }),
            None => Err(ContainerError::NotCopyable {
                type_name: raw.type_name().unwrap_or_default(),
            }),
        }
    }

    /// Moves the target out into a new callable, leaving `self` empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        // SAFETY:
        // 1. Nothing is bound; the target is moved out.
        // 2. After the move the raw target is empty and bound to `S::EMPTY`.
        let (raw, trampoline) = unsafe { self.parts_mut() };
        let taken = raw.take();
        let bound = core::mem::replace(trampoline, S::EMPTY);
        // SAFETY:
        // 1. The type parameters do not change.
        // 2. The target came from a callable with the same marker.
        // 3. `bound` was `S::EMPTY` if the target was empty.
        // 4. The target is moved with its placement unchanged.
        unsafe { Self::from_parts(taken, bound) }
    }

    /// Exchanges the targets of two callables.
    pub fn swap(&mut self, other: &mut Self) {
        // SAFETY:
        // 1. Both callables have the same marker.
        // 2. Targets and trampolines are exchanged together.
        let (ours, our_trampoline) = unsafe { self.parts_mut() };
        // SAFETY: See above.
        let (theirs, their_trampoline) = unsafe { other.parts_mut() };
        ours.swap(theirs);
        core::mem::swap(our_trampoline, their_trampoline);
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts().0.is_empty()
    }

    /// Returns `true` if a target is bound and stored inside the callable.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.parts().0.placement() == Some(Placement::Inline)
    }

    /// Returns `true` if a target is bound and stored in a heap block.
    #[must_use]
    pub fn is_heap(&self) -> bool {
        self.parts().0.placement() == Some(Placement::Heap)
    }

    /// Returns the name of the bound target's type, or `None` when empty.
    #[must_use]
    pub fn target_type_name(&self) -> Option<&'static str> {
        self.parts().0.type_name()
    }
}

/// Chooses the trampoline for `F` under the placement `P` gives it.
fn trampoline_for<S, P, F>() -> S::Trampoline
where
    S: Signature,
    P: StoragePolicy,
    F: CallTarget<S>,
{
    match RawValue::<P>::placement_for(Layout::new::<F>()) {
        Placement::Inline => F::INLINE,
        Placement::Heap => F::HEAP,
    }
}

impl<S: Signature, P: StoragePolicy, T> Default for PolyFn<S, P, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: Signature, P: StoragePolicy, T> fmt::Debug for PolyFn<S, P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.parts().0;
        match (raw.type_name(), raw.placement()) {
            (Some(type_name), Some(placement)) => f
                .debug_struct("PolyFn")
                .field("target", &type_name)
                .field("placement", &placement)
                .finish(),
            _ => f.write_str("PolyFn(<empty>)"),
        }
    }
}

// SAFETY: The `SendSync` marker indicates that the bound target is
// `Send`+`Sync`. Trampolines are plain function pointers. Therefore it is safe
// to implement `Send`+`Sync` for the callable itself.
unsafe impl<S: Signature, P: StoragePolicy> Send for PolyFn<S, P, SendSync> {}

// SAFETY: The `SendSync` marker indicates that the bound target is
// `Send`+`Sync`. Trampolines are plain function pointers. Therefore it is safe
// to implement `Send`+`Sync` for the callable itself.
unsafe impl<S: Signature, P: StoragePolicy> Sync for PolyFn<S, P, SendSync> {}

#[cfg(test)]
mod tests {
    use alloc::{format, rc::Rc, string::String};
    use core::cell::Cell;

    use polybox_internals::{policy::InlineOrHeap, space::A8};

    use super::*;
    use crate::markers::Local;

    #[test]
    fn test_poly_fn_send_sync() {
        static_assertions::assert_impl_all!(PolyFn<fn(u8) -> u8>: Send, Sync);
        static_assertions::assert_not_impl_any!(
            PolyFn<fn(u8) -> u8, DefaultPolicy, Local>: Send, Sync
        );
    }

    #[test]
    fn test_arities() {
        let zero: PolyFn<fn() -> u8> = PolyFn::new(|| 7u8);
        assert_eq!(zero.call(), 7);

        let eight: PolyFn<fn(u8, u8, u8, u8, u8, u8, u8, u8) -> u32> =
            PolyFn::new(|a: u8, b: u8, c: u8, d: u8, e: u8, f: u8, g: u8, h: u8| {
                [a, b, c, d, e, f, g, h]
                    .iter()
                    .map(|&x| u32::from(x))
                    .sum()
            });
        assert_eq!(eight.call(1, 2, 3, 4, 5, 6, 7, 8), 36);
    }

    #[test]
    fn test_heap_target() {
        let table = [3u64; 8];
        let lookup: PolyFn<fn(usize) -> u64, InlineOrHeap<A8<16>>> =
            PolyFn::new(move |i: usize| table[i] * 2);
        assert!(!lookup.is_inline());
        assert!(lookup.is_heap());
        assert_eq!(lookup.call(4), 6);

        let copy = lookup.try_clone().unwrap();
        drop(lookup);
        assert_eq!(copy.call(0), 6);
    }

    #[test]
    fn test_take_and_swap_move_trampolines() {
        let mut double: PolyFn<fn(i32) -> i32> = PolyFn::new(|x: i32| x * 2);
        let mut negate: PolyFn<fn(i32) -> i32> = PolyFn::new_move_only(|x: i32| -x);
        double.swap(&mut negate);
        assert_eq!(double.call(3), -3);
        assert_eq!(negate.call(3), 6);

        let taken = negate.take();
        assert!(negate.is_empty());
        assert_eq!(negate.try_call(3), Err(ContainerError::EmptyInvocation));
        assert_eq!(taken.call(4), 8);
    }

    #[test]
    fn test_set_replaces_target() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let mut callback: PolyFn<fn(), DefaultPolicy, Local> =
            PolyFn::new(move || seen.set(seen.get() + 1));
        callback.call();
        assert_eq!(calls.get(), 1);

        callback.set_trivial(|| {});
        callback.call();
        assert_eq!(calls.get(), 1);
        assert_eq!(Rc::strong_count(&calls), 1);

        callback.reset();
        assert!(callback.is_empty());
        assert_eq!(callback.target_type_name(), None);
    }

    #[test]
    fn test_move_only_target_is_not_copyable() {
        let owned = String::from("owned");
        let describe: PolyFn<fn() -> usize> = PolyFn::new_move_only(move || owned.len());
        assert!(matches!(
            describe.try_clone(),
            Err(ContainerError::NotCopyable { .. })
        ));
        assert_eq!(describe.call(), 5);
        assert!(format!("{describe:?}").starts_with("PolyFn {"));
    }
}

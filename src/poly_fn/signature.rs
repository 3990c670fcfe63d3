//! Call signatures and the trampolines bound for them.
//!
//! A signature is written as a function pointer type, `fn(A0, .., An) -> R`,
//! for up to eight arguments. For each signature there are three kinds of
//! trampoline: one per call target for inline storage, one per call target
//! for heap storage, and a single cold one for empty callables.

use core::ptr::NonNull;

use polybox_internals::{Erased, heap_target, inline_target, policy::StoragePolicy};

use super::PolyFn;
use crate::ContainerError;

mod sealed {
    pub trait Sealed {}
}

/// A call signature usable with [`PolyFn`].
///
/// Implemented for function pointer types `fn(A0, .., An) -> R` with up to
/// eight arguments. Signatures with elided reference lifetimes, such as
/// `fn(&str)`, are higher-ranked and not supported; name the lifetime instead,
/// or pass owned arguments.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait Signature: sealed::Sealed + Copy {
    /// The bound function pointer: the erased context followed by the
    /// arguments of the signature.
    #[doc(hidden)]
    type Trampoline: Copy;

    /// Trampoline bound to empty callables.
    #[doc(hidden)]
    const EMPTY: Self::Trampoline;
}

/// A value that can be called with the signature `S`.
///
/// Implemented for every `'static` type implementing [`Fn`] with the
/// arguments and return type of `S`: closures, function items and function
/// pointers.
pub trait CallTarget<S: Signature>: 'static {
    /// Trampoline for a target stored inline.
    #[doc(hidden)]
    const INLINE: S::Trampoline;

    /// Trampoline for a target stored in a heap block.
    #[doc(hidden)]
    const HEAP: S::Trampoline;
}

#[cold]
#[inline(never)]
fn empty_invocation() -> ! {
    panic!("{}", ContainerError::EMPTY_INVOCATION)
}

macro_rules! signatures {
    ($($arg:ident: $ty:ident),*) => {
        impl<R, $($ty),*> sealed::Sealed for fn($($ty),*) -> R {}

        impl<R, $($ty),*> Signature for fn($($ty),*) -> R {
            type Trampoline = unsafe fn(NonNull<Erased>, $($ty),*) -> R;

            const EMPTY: Self::Trampoline = {
                unsafe fn empty<R, $($ty),*>(_ctx: NonNull<Erased>, $(_: $ty),*) -> R {
                    empty_invocation()
                }
                empty::<R, $($ty),*>
            };
        }

        impl<F, R, $($ty),*> CallTarget<fn($($ty),*) -> R> for F
        where
            F: Fn($($ty),*) -> R + 'static,
        {
            const INLINE: unsafe fn(NonNull<Erased>, $($ty),*) -> R = {
                unsafe fn inline<F: Fn($($ty),*) -> R, R, $($ty),*>(
                    ctx: NonNull<Erased>,
                    $($arg: $ty),*
                ) -> R {
                    // SAFETY: Inline trampolines are only bound to containers
                    // holding an `F` inline.
                    let target = unsafe { inline_target::<F>(ctx) };
                    target($($arg),*)
                }
                inline::<F, R, $($ty),*>
            };

            const HEAP: unsafe fn(NonNull<Erased>, $($ty),*) -> R = {
                unsafe fn heap<F: Fn($($ty),*) -> R, R, $($ty),*>(
                    ctx: NonNull<Erased>,
                    $($arg: $ty),*
                ) -> R {
                    // SAFETY: Heap trampolines are only bound to containers
                    // holding an `F` in a heap block.
                    let target = unsafe { heap_target::<F>(ctx) };
                    target($($arg),*)
                }
                heap::<F, R, $($ty),*>
            };
        }

        impl<R, $($ty,)* P: StoragePolicy, T> PolyFn<fn($($ty),*) -> R, P, T> {
            /// Invokes the bound target with the given arguments.
            ///
            /// This is a single indirect call through the bound trampoline.
            ///
            /// # Panics
            ///
            /// Panics with the [`ContainerError::EmptyInvocation`] message if
            /// nothing is bound. Panics raised by the target propagate
            /// unchanged.
            #[inline]
            pub fn call(&self, $($arg: $ty),*) -> R {
                let (raw, trampoline) = self.parts();
                // SAFETY: The trampoline was bound for the current contents of
                // `raw` and its placement, and the context is the address of
                // its slot.
                unsafe { trampoline(raw.storage_ptr(), $($arg),*) }
            }

            /// Invokes the bound target, or reports an empty callable.
            ///
            /// # Errors
            ///
            /// Returns [`ContainerError::EmptyInvocation`] if nothing is
            /// bound.
            #[inline]
            pub fn try_call(&self, $($arg: $ty),*) -> Result<R, ContainerError> {
                if self.is_empty() {
                    return Err(ContainerError::EmptyInvocation);
                }
                Ok(self.call($($arg),*))
            }
        }
    };
}

signatures!();
signatures!(a0: A0);
signatures!(a0: A0, a1: A1);
signatures!(a0: A0, a1: A1, a2: A2);
signatures!(a0: A0, a1: A1, a2: A2, a3: A3);
signatures!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4);
signatures!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
signatures!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);
signatures!(a0: A0, a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6, a7: A7);

//! Marker types selecting the guarantees of a container.
//!
//! Containers carry two kinds of markers as type or method parameters.
//!
//! # Thread Safety Markers
//!
//! The last type parameter of [`PolyBox<P, T>`](crate::PolyBox) and
//! [`PolyFn<S, P, T>`](crate::PolyFn) decides which values may be stored and
//! whether the container may cross threads:
//!
//! - [`SendSync`]: Only `Send + Sync` values are accepted, and the container
//!   is `Send + Sync` itself. This is the default.
//! - [`Local`]: Any `'static` value is accepted, including `Rc` and raw
//!   pointers, and the container stays on its thread.
//!
//! The constraint is enforced when a value is bound through the
//! [`ObjectMarkerFor`] bound, so it is impossible to construct a
//! `PolyBox<_, SendSync>` holding a value that is not thread-safe.
//!
//! # Capability Markers
//!
//! [`Cloneable`], [`MoveOnly`] and [`Trivial`] decide which lifecycle
//! operations a value keeps after being erased. They are chosen by the
//! constructor (`new`, `new_move_only`, `new_trivial`) or passed explicitly to
//! [`PolyBox::with_capabilities`](crate::PolyBox::with_capabilities).
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//!
//! use polybox::{PolyBox, markers::Local, policy::DefaultPolicy};
//!
//! let shared: PolyBox = PolyBox::new(String::from("sendable"));
//! std::thread::spawn(move || assert!(shared.holds::<String>()))
//!     .join()
//!     .unwrap();
//!
//! let local: PolyBox<DefaultPolicy, Local> = PolyBox::new(Rc::new(5));
//! assert_eq!(**local.get::<Rc<i32>>().unwrap(), 5);
//! ```
//!
//! Values that are not thread-safe are rejected by the default marker:
//!
//! ```compile_fail
//! use std::rc::Rc;
//!
//! use polybox::PolyBox;
//!
//! let value: PolyBox = PolyBox::new(Rc::new(5));
//! ```

pub use polybox_internals::capability::{Capabilities, Cloneable, MoveOnly, Trivial};

/// Marker type for containers that only hold `Send + Sync` values.
///
/// Containers with this marker are `Send + Sync` themselves.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct SendSync;

/// Marker type for containers that may hold values which are not thread-safe.
///
/// Containers with this marker are neither `Send` nor `Sync`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Local;

mod sealed_thread_safety_marker {
    use super::*;

    pub trait Sealed: 'static {}

    impl Sealed for SendSync {}
    impl Sealed for Local {}
}

/// Marker trait implemented by [`SendSync`] and [`Local`].
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait ThreadSafetyMarker: sealed_thread_safety_marker::Sealed {}

impl ThreadSafetyMarker for SendSync {}
impl ThreadSafetyMarker for Local {}

/// Marker trait for values that may be stored under the thread-safety marker
/// `T`.
///
/// - For `T = Local`: implemented for all `'static` types.
/// - For `T = SendSync`: implemented for `'static` types that are also
///   `Send + Sync`.
pub trait ObjectMarkerFor<T>: 'static {}

impl<O: 'static> ObjectMarkerFor<Local> for O {}

impl<O: 'static> ObjectMarkerFor<SendSync> for O where O: Send + Sync {}

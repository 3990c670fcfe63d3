//! Runtime identity of erased types.
//!
//! A [`TypeToken`] is bound next to the [`OperationTable`] of a stored value.
//! It lives outside the table because types that share a shape table (see
//! [`Trivial`]) must still be told apart by `holds` and `get`.
//!
//! [`OperationTable`]: crate::OperationTable
//! [`Trivial`]: crate::capability::Trivial

use core::any::TypeId;

/// Per-type record behind a [`TypeToken`].
struct TypeTag {
    /// Gets the [`TypeId`] of the type this tag was created for.
    type_id: fn() -> TypeId,
    /// Gets the [`core::any::type_name`] of the type this tag was created for.
    type_name: fn() -> &'static str,
}

/// Opaque, comparable identity of a `'static` type.
///
/// Tokens compare equal exactly when they were created for the same type.
///
/// # Examples
///
/// ```
/// use polybox_internals::TypeToken;
///
/// let a = TypeToken::of::<u32>();
/// assert_eq!(a, TypeToken::of::<u32>());
/// assert_ne!(a, TypeToken::of::<i32>());
/// assert!(a.is::<u32>());
/// assert_eq!(a.type_name(), "u32");
/// ```
#[derive(Copy, Clone)]
pub struct TypeToken {
    /// The per-type tag.
    tag: &'static TypeTag,
}

impl TypeToken {
    /// Returns the token of `T`.
    #[inline]
    #[must_use]
    pub const fn of<T: 'static>() -> Self {
        Self {
            tag: const {
                &TypeTag {
                    type_id: TypeId::of::<T>,
                    type_name: core::any::type_name::<T>,
                }
            },
        }
    }

    /// Returns the [`TypeId`] of the type this token was created for.
    #[inline]
    #[must_use]
    pub fn type_id(self) -> TypeId {
        (self.tag.type_id)()
    }

    /// Returns the [`core::any::type_name`] of the type this token was
    /// created for.
    #[inline]
    #[must_use]
    pub fn type_name(self) -> &'static str {
        (self.tag.type_name)()
    }

    /// Returns `true` if this token was created for `T`.
    #[inline]
    #[must_use]
    pub fn is<T: 'static>(self) -> bool {
        self == Self::of::<T>()
    }
}

impl PartialEq for TypeToken {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Tags are usually deduplicated, but that is not guaranteed.
        core::ptr::eq(self.tag, other.tag) || self.type_id() == other.type_id()
    }
}

impl Eq for TypeToken {}

impl core::hash::Hash for TypeToken {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.type_id().hash(state);
    }
}

impl core::fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("TypeToken").field(&self.type_name()).finish()
    }
}

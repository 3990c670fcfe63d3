//! The error type returned by container operations.

use core::fmt;

/// Error returned when a container operation cannot be carried out.
///
/// None of these errors leave a container in an invalid state: the operation
/// that failed has no effect, unless documented otherwise.
///
/// # Examples
///
/// ```
/// use polybox::{ContainerError, PolyBox};
///
/// let value: PolyBox = PolyBox::new(42u32);
/// let err = value.get::<String>().unwrap_err();
/// assert!(matches!(err, ContainerError::TypeMismatch { .. }));
/// assert_eq!(
///     err.to_string(),
///     "type mismatch: expected alloc::string::String, found u32"
/// );
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[non_exhaustive]
pub enum ContainerError {
    /// The value does not fit the inline storage of a policy without heap
    /// fallback.
    ///
    /// Binding such a value fails to compile. This error is only returned at
    /// run time when moving an existing value into another policy, see
    /// [`PolyBox::relocate_into`](crate::PolyBox::relocate_into).
    StorageTooSmall {
        /// Size of the value in bytes.
        needed_size: usize,
        /// Alignment of the value in bytes.
        needed_align: usize,
        /// Capacity of the inline storage in bytes.
        capacity: usize,
        /// Alignment of the inline storage in bytes.
        alignment: usize,
    },
    /// The held value was bound without a copy operation.
    NotCopyable {
        /// Name of the held type.
        type_name: &'static str,
    },
    /// The held value has a different type than the one requested.
    TypeMismatch {
        /// Name of the requested type.
        expected: &'static str,
        /// Name of the held type.
        found: &'static str,
    },
    /// The container holds nothing.
    Empty {
        /// Name of the requested type.
        expected: &'static str,
    },
    /// An empty callable was invoked.
    EmptyInvocation,
}

impl ContainerError {
    /// Message used both by [`Display`](fmt::Display) and the panic raised
    /// when an empty callable is invoked through `call`.
    pub(crate) const EMPTY_INVOCATION: &'static str = "called an empty PolyFn";
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageTooSmall {
                needed_size,
                needed_align,
                capacity,
                alignment,
            } => write!(
                f,
                "storage too small: value needs {needed_size} bytes aligned to {needed_align}, \
                 storage has {capacity} bytes aligned to {alignment}"
            ),
            Self::NotCopyable { type_name } => {
                write!(f, "value of type {type_name} is not copyable")
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Self::Empty { expected } => {
                write!(f, "container is empty, expected a value of type {expected}")
            }
            Self::EmptyInvocation => f.write_str(Self::EMPTY_INVOCATION),
        }
    }
}

impl core::error::Error for ContainerError {}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    static_assertions::assert_impl_all!(ContainerError: Copy, Send, Sync, core::error::Error);

    #[test]
    fn test_display() {
        let err = ContainerError::StorageTooSmall {
            needed_size: 32,
            needed_align: 8,
            capacity: 16,
            alignment: 8,
        };
        assert_eq!(
            err.to_string(),
            "storage too small: value needs 32 bytes aligned to 8, storage has 16 bytes aligned to 8"
        );
        assert_eq!(
            ContainerError::NotCopyable { type_name: "Foo" }.to_string(),
            "value of type Foo is not copyable"
        );
        assert_eq!(
            ContainerError::EmptyInvocation.to_string(),
            "called an empty PolyFn"
        );
    }
}

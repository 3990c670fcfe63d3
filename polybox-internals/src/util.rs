//! Internal utility types.

/// Marker type used when type-erasing stored values.
///
/// This zero-sized type serves as the pointee of pointers whose actual
/// concrete type has been erased. For example, a `NonNull<Erased>` handed to
/// an [`OperationTable`](crate::OperationTable) entry points to a value of
/// whatever type the table was created for.
///
/// Using a distinct marker type (rather than `()` or `u8`) makes the intent
/// clearer in type signatures and error messages.
#[derive(Copy, Clone, Debug)]
pub struct Erased;

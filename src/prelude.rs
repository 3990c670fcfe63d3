//! Commonly used items for convenient importing.
//!
//! ```
//! use polybox::prelude::*;
//!
//! fn lookup(value: &PolyBox) -> Result<u32, ContainerError> {
//!     value.get::<u32>().copied()
//! }
//!
//! assert_eq!(lookup(&PolyBox::new(3u32)), Ok(3));
//! ```

pub use crate::{
    ContainerError, PolyBox, PolyFn, markers,
    policy::{DefaultPolicy, InlineOnly, InlineOrHeap},
    space,
};

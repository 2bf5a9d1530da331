//! `String` and `Vec` from `std` or `alloc`, depending on features.

#[cfg(feature = "std")]
pub use std::{string::String, vec::Vec};

#[cfg(all(feature = "alloc", not(feature = "std")))]
pub use alloc::{string::String, vec::Vec};

//! # kapply_assets
//!
//! Template asset sources for kapply.
//!
//! Templates are resolved by name through the [`AssetSource`] trait,
//! backed either by an in-memory map ([`MemorySource`]) or a directory
//! tree ([`DirSource`]).

pub mod error;
pub mod source;

pub use error::{AssetError, AssetResult};
pub use source::{AssetSource, DirSource, MemorySource};

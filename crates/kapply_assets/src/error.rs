//! Error types for asset sources.

use thiserror::Error;

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors that can occur when resolving template assets.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

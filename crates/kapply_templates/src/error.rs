//! Error types for template rendering.

use thiserror::Error;

use kapply_assets::AssetError;

/// Result type alias for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during template rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Template {0} is not valid UTF-8")]
    InvalidUtf8(String),

    #[error("Variable not provided: {0}")]
    MissingVariable(String),

    #[error("Unknown template function: {0}")]
    UnknownFunction(String),

    #[error("Template function {function} failed: {message}")]
    FunctionFailed { function: String, message: String },
}

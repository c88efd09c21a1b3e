//! Error types for the apply pipeline.

use thiserror::Error;

use kapply_templates::RenderError;

/// Result type alias for pipeline operations.
pub type CoreResult<T> = Result<T, ApplierError>;

/// Errors surfaced by the apply pipeline.
///
/// Render and decode failures abort a call before any remote mutation.
/// Per-resource apply failures are recorded in the `ApplyResult` instead;
/// `Aggregate` is only produced when a caller asks for the combined
/// success signal of a result that contains failures.
#[derive(Error, Debug)]
pub enum ApplierError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    OwnerResolution(#[from] OwnerResolutionError),

    #[error(transparent)]
    SchemaNotReady(#[from] SchemaNotReadyError),

    #[error("Cluster request failed: {0}")]
    Cluster(#[from] kube::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Apply failed for {ident}: {message}")]
    Apply { ident: String, message: String },

    #[error("Invalid applier configuration: {0}")]
    Configuration(String),

    #[error("{failed} of {total} resources failed to apply: {details}")]
    Aggregate {
        failed: usize,
        total: usize,
        details: String,
    },
}

impl ApplierError {
    /// True when the underlying API response is a create conflict.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            ApplierError::Cluster(kube::Error::Api(resp))
                if resp.reason == "AlreadyExists" || resp.code == 409
        )
    }
}

/// Errors raised while decoding a rendered manifest stream.
///
/// Any decode error aborts the whole batch; a partial decode is never
/// returned.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Document {index} is not valid YAML: {source}")]
    Yaml {
        index: usize,
        source: serde_yaml::Error,
    },

    #[error("Document {index} is missing apiVersion or kind")]
    MissingTypeInfo { index: usize },

    #[error("Document {index} ({kind}) is missing metadata.name")]
    MissingName { index: usize, kind: String },
}

/// Errors raised while resolving an owner object into an owner reference.
#[derive(Error, Debug)]
pub enum OwnerResolutionError {
    #[error("Owner kind cannot be resolved for object {0}")]
    UnknownKind(String),

    #[error("Owner of kind {kind} has no name")]
    MissingName { kind: String },

    #[error("Owner {kind}/{name} has no server-assigned uid; persist it before deriving references")]
    MissingUid { kind: String, name: String },
}

/// A custom resource definition never reached the established state.
#[derive(Error, Debug)]
#[error("Custom resource definition for {group}/{kind} did not become established: {last_observed}")]
pub struct SchemaNotReadyError {
    pub group: String,
    pub kind: String,
    /// The last condition state observed before giving up.
    pub last_observed: String,
}

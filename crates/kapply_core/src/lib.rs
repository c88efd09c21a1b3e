//! # kapply_core
//!
//! The apply pipeline: template rendering → multi-document decoding →
//! schema readiness gating → ordered, idempotent resource application →
//! owner reference stamping.
//!
//! An [`Applier`] is assembled once from [`ApplierOptions`] and exposes
//! [`Applier::apply_directly`] (no schema-extension handling) and
//! [`Applier::apply_custom_resources`] (full pipeline with the readiness
//! gate). Remote access goes through the [`DynamicClusterClient`] and
//! [`SchemaClient`] traits; [`KubeClusterClient`] and [`KubeSchemaClient`]
//! back them with a real cluster.

pub mod applier;
pub mod cluster;
pub mod decode;
pub mod engine;
pub mod error;
pub mod gate;
pub mod outcome;
pub mod owner;
pub mod resource;

pub use applier::{Applier, ApplierOptions};
pub use cluster::{
    DynamicClusterClient, KubeClusterClient, KubeSchemaClient, SchemaClient, SchemaStatus,
    SchemaSubmission,
};
pub use decode::decode_manifests;
pub use engine::ApplyEngine;
pub use error::{
    ApplierError, CoreResult, DecodeError, OwnerResolutionError, SchemaNotReadyError,
};
pub use gate::{ReadinessGate, SchemaReadiness};
pub use outcome::{ApplyAction, ApplyOutcome, ApplyResult};
pub use owner::{OwnerObject, OwnerSpec};
pub use resource::{DecodedResource, ResourceIdent};

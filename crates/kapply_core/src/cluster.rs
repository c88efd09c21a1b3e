//! Remote cluster client boundary.
//!
//! The engine only needs create/update/get for arbitrary resources and a
//! status query for custom resource definitions. Both concerns are trait
//! objects so tests can substitute in-memory fakes and mocks; the
//! kube-backed implementations route dynamically via the GVK of each
//! resource.

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, PostParams};
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreResult;
use crate::resource::ResourceIdent;

/// Result of submitting a schema definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSubmission {
    Created,
    AlreadyExists,
}

/// Observed readiness conditions of a schema definition.
#[derive(Debug, Clone)]
pub struct SchemaStatus {
    pub established: bool,
    pub names_accepted: bool,
    /// Human-readable condition summary for diagnostics.
    pub summary: String,
}

impl SchemaStatus {
    /// Established and serving under its intended names; both conditions
    /// are required simultaneously.
    pub fn is_ready(&self) -> bool {
        self.established && self.names_accepted
    }
}

/// Create/update/get for arbitrary resources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DynamicClusterClient: Send + Sync {
    /// Fetch the live object, `None` when absent.
    async fn get(&self, ident: &ResourceIdent) -> CoreResult<Option<Value>>;

    /// Create the resource; a conflict surfaces as an error for which
    /// [`crate::ApplierError::is_already_exists`] returns true.
    async fn create(&self, ident: &ResourceIdent, body: &Value) -> CoreResult<Value>;

    /// Replace the live object with `body`; the body must carry the live
    /// resourceVersion for the server's optimistic concurrency check.
    async fn update(&self, ident: &ResourceIdent, body: &Value) -> CoreResult<Value>;
}

/// Submission and status queries for custom resource definitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaClient: Send + Sync {
    /// Create the definition, or confirm an existing one; never errors on
    /// an already-present definition.
    async fn submit(&self, body: &Value) -> CoreResult<SchemaSubmission>;

    /// Read the readiness conditions of the named definition.
    async fn status(&self, name: &str) -> CoreResult<SchemaStatus>;
}

/// [`DynamicClusterClient`] backed by a kube client, routing each request
/// through the resource's GVK.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
}

impl KubeClusterClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api_for(&self, ident: &ResourceIdent) -> Api<DynamicObject> {
        let resource = ApiResource::from_gvk(&ident.gvk());
        match &ident.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

#[async_trait]
impl DynamicClusterClient for KubeClusterClient {
    async fn get(&self, ident: &ResourceIdent) -> CoreResult<Option<Value>> {
        let api = self.api_for(ident);
        let object = api.get_opt(&ident.name).await?;
        Ok(object.map(serde_json::to_value).transpose()?)
    }

    async fn create(&self, ident: &ResourceIdent, body: &Value) -> CoreResult<Value> {
        let api = self.api_for(ident);
        let object: DynamicObject = serde_json::from_value(body.clone())?;
        debug!("Creating {}", ident);
        let created = api.create(&PostParams::default(), &object).await?;
        Ok(serde_json::to_value(created)?)
    }

    async fn update(&self, ident: &ResourceIdent, body: &Value) -> CoreResult<Value> {
        let api = self.api_for(ident);
        let object: DynamicObject = serde_json::from_value(body.clone())?;
        debug!("Updating {}", ident);
        let updated = api
            .replace(&ident.name, &PostParams::default(), &object)
            .await?;
        Ok(serde_json::to_value(updated)?)
    }
}

/// [`SchemaClient`] backed by the typed CustomResourceDefinition API.
#[derive(Clone)]
pub struct KubeSchemaClient {
    api: Api<CustomResourceDefinition>,
}

impl KubeSchemaClient {
    pub fn new(client: kube::Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl SchemaClient for KubeSchemaClient {
    async fn submit(&self, body: &Value) -> CoreResult<SchemaSubmission> {
        let definition: CustomResourceDefinition = serde_json::from_value(body.clone())?;
        match self.api.create(&PostParams::default(), &definition).await {
            Ok(_) => Ok(SchemaSubmission::Created),
            Err(err) => {
                let err = crate::error::ApplierError::from(err);
                if err.is_already_exists() {
                    debug!("Schema definition already present, treating as submitted");
                    Ok(SchemaSubmission::AlreadyExists)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn status(&self, name: &str) -> CoreResult<SchemaStatus> {
        let definition = self.api.get(name).await?;
        let conditions = definition
            .status
            .and_then(|s| s.conditions)
            .unwrap_or_default();

        let condition_true = |kind: &str| {
            conditions
                .iter()
                .any(|c| c.type_ == kind && c.status == "True")
        };
        let summary = if conditions.is_empty() {
            "no conditions reported".to_string()
        } else {
            conditions
                .iter()
                .map(|c| format!("{}={}", c.type_, c.status))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Ok(SchemaStatus {
            established: condition_true("Established"),
            names_accepted: condition_true("NamesAccepted"),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_status_requires_both_conditions() {
        let base = SchemaStatus {
            established: false,
            names_accepted: false,
            summary: String::new(),
        };
        assert!(!base.is_ready());
        assert!(!SchemaStatus {
            established: true,
            ..base.clone()
        }
        .is_ready());
        assert!(!SchemaStatus {
            names_accepted: true,
            ..base.clone()
        }
        .is_ready());
        assert!(SchemaStatus {
            established: true,
            names_accepted: true,
            ..base
        }
        .is_ready());
    }
}

//! Applier facade: configuration, validation, and the public apply
//! entry points.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

use kapply_assets::AssetSource;
use kapply_templates::{TemplateContext, TemplateFn, TemplateRenderer};

use crate::cluster::{DynamicClusterClient, SchemaClient};
use crate::decode::decode_manifests;
use crate::engine::ApplyEngine;
use crate::error::{ApplierError, CoreResult};
use crate::gate::ReadinessGate;
use crate::outcome::ApplyResult;
use crate::owner::OwnerSpec;
use crate::resource::DecodedResource;

/// Configuration accepted by [`Applier::new`].
///
/// A plain struct rather than a fluent builder: fill in the fields,
/// construct the applier, and validation happens once at construction.
#[derive(Clone)]
pub struct ApplierOptions {
    /// Client for arbitrary resources. Required.
    pub cluster: Option<Arc<dyn DynamicClusterClient>>,
    /// Client for custom resource definitions. Required.
    pub schema: Option<Arc<dyn SchemaClient>>,
    /// Owner to stamp onto every applied instance resource.
    pub owner: Option<OwnerSpec>,
    /// Functions available to every template rendered through this
    /// applier; per-call registrations take precedence.
    pub functions: HashMap<String, TemplateFn>,
    /// Validate and preview without mutating the cluster.
    pub dry_run: bool,
    /// Keep applying after a per-resource failure (default true).
    pub continue_on_error: bool,
    /// Schema readiness poll interval.
    pub poll_interval: Option<Duration>,
    /// Overall schema readiness deadline.
    pub timeout: Option<Duration>,
}

impl Default for ApplierOptions {
    fn default() -> Self {
        Self {
            cluster: None,
            schema: None,
            owner: None,
            functions: HashMap::new(),
            dry_run: false,
            continue_on_error: true,
            poll_interval: None,
            timeout: None,
        }
    }
}

/// The configured pipeline: render, decode, gate, apply.
///
/// Immutable once built; `apply_*` calls borrow it and keep no state
/// across calls, so independent invocations may run concurrently over
/// the same instance.
pub struct Applier {
    cluster: Arc<dyn DynamicClusterClient>,
    schema: Arc<dyn SchemaClient>,
    owner_ref: Option<OwnerReference>,
    functions: HashMap<String, TemplateFn>,
    renderer: TemplateRenderer,
    gate: ReadinessGate,
    dry_run: bool,
    continue_on_error: bool,
}

impl std::fmt::Debug for Applier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Applier")
            .field("owner_ref", &self.owner_ref)
            .field("dry_run", &self.dry_run)
            .field("continue_on_error", &self.continue_on_error)
            .finish_non_exhaustive()
    }
}

impl Applier {
    /// Validate the options and build the pipeline.
    ///
    /// Fails when either client is missing, or when an owner is supplied
    /// whose reference cannot be resolved (unknown kind, missing name or
    /// uid) — owner problems are surfaced here, before any apply begins.
    pub fn new(options: ApplierOptions) -> CoreResult<Self> {
        let cluster = options
            .cluster
            .ok_or_else(|| ApplierError::Configuration("a cluster client is required".into()))?;
        let schema = options
            .schema
            .ok_or_else(|| ApplierError::Configuration("a schema client is required".into()))?;

        // Resolved once; every resource this applier produces carries the
        // same reference.
        let owner_ref = options
            .owner
            .as_ref()
            .map(OwnerSpec::reference)
            .transpose()?;

        let gate = ReadinessGate::new(
            options.poll_interval.unwrap_or(Duration::from_secs(2)),
            options.timeout.unwrap_or(Duration::from_secs(60)),
        );

        Ok(Self {
            cluster,
            schema,
            owner_ref,
            functions: options.functions,
            renderer: TemplateRenderer::new(),
            gate,
            dry_run: options.dry_run,
            continue_on_error: options.continue_on_error,
        })
    }

    /// Render the named templates and decode the result without applying
    /// anything, for preview workflows.
    pub fn render_templates(
        &self,
        assets: &dyn AssetSource,
        templates: &[&str],
        values: &Value,
    ) -> CoreResult<Vec<DecodedResource>> {
        let ctx = TemplateContext::new(values.clone()).with_functions(&self.functions);
        let mut resources = Vec::new();
        for name in templates {
            let rendered = self.renderer.render(name, assets, &ctx)?;
            resources.extend(decode_manifests(&rendered)?);
        }
        Ok(resources)
    }

    /// Render, decode, and apply without any schema-extension handling.
    ///
    /// For manifest sets known not to contain schema definitions; any
    /// definition present is applied as an ordinary resource with no
    /// readiness wait.
    pub async fn apply_directly(
        &self,
        assets: &dyn AssetSource,
        templates: &[&str],
        values: &Value,
    ) -> CoreResult<ApplyResult> {
        self.apply(assets, templates, values, false).await
    }

    /// The full pipeline: render, decode, submit schema definitions and
    /// gate on their readiness, then apply instances in order.
    pub async fn apply_custom_resources(
        &self,
        assets: &dyn AssetSource,
        templates: &[&str],
        values: &Value,
    ) -> CoreResult<ApplyResult> {
        self.apply(assets, templates, values, true).await
    }

    async fn apply(
        &self,
        assets: &dyn AssetSource,
        templates: &[&str],
        values: &Value,
        gate_schemas: bool,
    ) -> CoreResult<ApplyResult> {
        let resources = self.render_templates(assets, templates, values)?;
        info!(
            "Applying {} resources from {} templates (dry_run={})",
            resources.len(),
            templates.len(),
            self.dry_run
        );

        let engine = ApplyEngine {
            cluster: self.cluster.as_ref(),
            schema: self.schema.as_ref(),
            gate: &self.gate,
            owner_ref: self.owner_ref.as_ref(),
            dry_run: self.dry_run,
            continue_on_error: self.continue_on_error,
            gate_schemas,
        };
        Ok(engine.apply_all(&resources).await)
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::{MockDynamicClusterClient, MockSchemaClient};

    use super::*;

    #[test]
    fn missing_cluster_client_is_a_configuration_error() {
        let options = ApplierOptions {
            schema: Some(Arc::new(MockSchemaClient::new())),
            ..Default::default()
        };
        let err = Applier::new(options).unwrap_err();
        assert!(matches!(err, ApplierError::Configuration(_)));
    }

    #[test]
    fn missing_schema_client_is_a_configuration_error() {
        let options = ApplierOptions {
            cluster: Some(Arc::new(MockDynamicClusterClient::new())),
            ..Default::default()
        };
        let err = Applier::new(options).unwrap_err();
        assert!(matches!(err, ApplierError::Configuration(_)));
    }

    #[test]
    fn unresolvable_owner_fails_at_construction() {
        use k8s_openapi::api::core::v1::Namespace;
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

        use crate::owner::OwnerObject;

        // Owner was never persisted: no uid.
        let owner = Namespace {
            metadata: ObjectMeta {
                name: Some("fresh".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let options = ApplierOptions {
            cluster: Some(Arc::new(MockDynamicClusterClient::new())),
            schema: Some(Arc::new(MockSchemaClient::new())),
            owner: Some(OwnerSpec {
                object: OwnerObject::typed(&owner),
                controller: false,
                block_owner_deletion: false,
            }),
            ..Default::default()
        };
        let err = Applier::new(options).unwrap_err();
        assert!(matches!(err, ApplierError::OwnerResolution(_)));
    }
}

//! Ordered, idempotent resource application.
//!
//! Resources are processed strictly in input order. Schema definitions
//! are submitted and gated before any later document is touched, so an
//! instance of a freshly registered type never races schema propagation.
//! A definition that fails to establish poisons its served group/kind:
//! pending instances of that type are skipped, not attempted.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

use crate::cluster::{DynamicClusterClient, SchemaClient, SchemaSubmission};
use crate::error::{ApplierError, CoreResult};
use crate::gate::ReadinessGate;
use crate::outcome::{ApplyAction, ApplyOutcome, ApplyResult};
use crate::resource::{DecodedResource, ResourceIdent};

/// One-shot apply pass over a decoded resource batch.
///
/// Constructed per invocation by the applier facade; holds only borrows
/// of the facade's immutable configuration.
pub struct ApplyEngine<'a> {
    pub cluster: &'a dyn DynamicClusterClient,
    pub schema: &'a dyn SchemaClient,
    pub gate: &'a ReadinessGate,
    /// Attached to every instance resource when set.
    pub owner_ref: Option<&'a OwnerReference>,
    /// Validate and preview only; no remote calls, gate skipped.
    pub dry_run: bool,
    /// When false, the first failure skips everything after it.
    pub continue_on_error: bool,
    /// When false, schema definitions are applied as ordinary resources
    /// without readiness gating (the `ApplyDirectly` contract).
    pub gate_schemas: bool,
}

impl ApplyEngine<'_> {
    /// Apply every resource in order, aggregating per-resource outcomes.
    pub async fn apply_all(&self, resources: &[DecodedResource]) -> ApplyResult {
        let mut result = ApplyResult::default();
        let mut failed_schemas: HashSet<(String, String)> = HashSet::new();
        let mut halted = false;

        for resource in resources {
            let ident = resource.ident.clone();
            if halted {
                result.push(ApplyOutcome::skipped(
                    ident,
                    "not attempted after an earlier failure",
                ));
                continue;
            }

            let outcome = if self.dry_run {
                self.validate(resource)
            } else if self.gate_schemas && resource.is_schema_definition() {
                self.apply_schema(resource, &mut failed_schemas).await
            } else {
                self.apply_instance(resource, &failed_schemas).await
            };

            if !outcome.is_success() && !self.continue_on_error {
                halted = true;
            }
            result.push(outcome);
        }
        result
    }

    /// Dry run: check the resource is well-formed and routable without
    /// touching the cluster.
    fn validate(&self, resource: &DecodedResource) -> ApplyOutcome {
        let ident = resource.ident.clone();
        if ident.version().is_empty() {
            return ApplyOutcome::failed(ident, "unroutable: empty API version");
        }
        debug!("Dry run: {} is well-formed", ident);
        ApplyOutcome::ok(ident, ApplyAction::Validated)
    }

    /// Submit a schema definition and wait for it to establish.
    async fn apply_schema(
        &self,
        resource: &DecodedResource,
        failed_schemas: &mut HashSet<(String, String)>,
    ) -> ApplyOutcome {
        let ident = resource.ident.clone();
        let (group, kind) = resource.served_group_kind().unwrap_or_default();

        let submission = match self.schema.submit(&resource.body).await {
            Ok(submission) => submission,
            Err(err) => {
                warn!("Schema definition {} submission failed: {}", ident, err);
                failed_schemas.insert((group, kind));
                return ApplyOutcome::failed(ident, err.to_string());
            }
        };

        match self
            .gate
            .wait_until_established(self.schema, &ident.name, &group, &kind)
            .await
        {
            Ok(()) => {
                let action = match submission {
                    SchemaSubmission::Created => ApplyAction::Created,
                    SchemaSubmission::AlreadyExists => ApplyAction::Unchanged,
                };
                ApplyOutcome::ok(ident, action)
            }
            Err(err) => {
                failed_schemas.insert((group, kind));
                ApplyOutcome::failed(ident, err.to_string())
            }
        }
    }

    async fn apply_instance(
        &self,
        resource: &DecodedResource,
        failed_schemas: &HashSet<(String, String)>,
    ) -> ApplyOutcome {
        let ident = resource.ident.clone();
        let group_kind = (ident.group().to_string(), ident.kind.clone());
        if failed_schemas.contains(&group_kind) {
            return ApplyOutcome::skipped(
                ident,
                format!(
                    "schema definition for {}/{} never became ready",
                    group_kind.0, group_kind.1
                ),
            );
        }

        match self.create_or_update(resource).await {
            Ok(action) => {
                info!("{} {}", action, resource.ident);
                ApplyOutcome::ok(ident, action)
            }
            Err(err) => ApplyOutcome::failed(ident, err.to_string()),
        }
    }

    async fn create_or_update(&self, resource: &DecodedResource) -> CoreResult<ApplyAction> {
        let mut desired = resource.body.clone();
        if let Some(owner_ref) = self.owner_ref {
            attach_owner_reference(&mut desired, owner_ref)?;
        }

        match self.cluster.create(&resource.ident, &desired).await {
            Ok(_) => Ok(ApplyAction::Created),
            Err(err) if err.is_already_exists() => {
                self.update_existing(&resource.ident, desired).await
            }
            Err(err) => Err(err),
        }
    }

    /// Update path for a resource that already exists: the live uid and
    /// resourceVersion are preserved, and owner references already present
    /// on the live object are never dropped.
    async fn update_existing(
        &self,
        ident: &ResourceIdent,
        mut desired: Value,
    ) -> CoreResult<ApplyAction> {
        let existing =
            self.cluster
                .get(ident)
                .await?
                .ok_or_else(|| ApplierError::Apply {
                    ident: ident.to_string(),
                    message: "create conflicted but the live object could not be fetched"
                        .to_string(),
                })?;

        for field in ["uid", "resourceVersion"] {
            if let Some(value) = existing.pointer(&format!("/metadata/{field}")) {
                desired["metadata"][field] = value.clone();
            }
        }
        merge_owner_references(&mut desired, &existing);

        if is_subset(&desired, &existing) {
            debug!("{} already matches desired content", ident);
            return Ok(ApplyAction::Unchanged);
        }

        self.cluster.update(ident, &desired).await?;
        Ok(ApplyAction::Updated)
    }
}

/// Append `owner_ref` to the body's metadata, deduplicating by uid.
fn attach_owner_reference(body: &mut Value, owner_ref: &OwnerReference) -> CoreResult<()> {
    let rendered = serde_json::to_value(owner_ref)?;
    let refs = body["metadata"]["ownerReferences"]
        .as_array_mut()
        .map(std::mem::take)
        .unwrap_or_default();

    let mut merged = refs;
    if !merged
        .iter()
        .any(|r| r.get("uid").and_then(Value::as_str) == Some(owner_ref.uid.as_str()))
    {
        merged.push(rendered);
    }
    body["metadata"]["ownerReferences"] = Value::Array(merged);
    Ok(())
}

/// Carry over owner references from the live object that the desired body
/// does not already hold (matched by uid).
fn merge_owner_references(desired: &mut Value, existing: &Value) {
    let existing_refs = existing
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if existing_refs.is_empty() {
        return;
    }

    let desired_refs = desired
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut merged = existing_refs;
    for reference in desired_refs {
        if !merged.iter().any(|m| m.get("uid") == reference.get("uid")) {
            merged.push(reference);
        }
    }
    desired["metadata"]["ownerReferences"] = Value::Array(merged);
}

/// True when every field set in `desired` is present with the same value
/// in `existing`. Fields only the server sets are ignored, which is what
/// makes the unchanged check meaningful.
fn is_subset(desired: &Value, existing: &Value) -> bool {
    match (desired, existing) {
        (Value::Object(d), Value::Object(e)) => d
            .iter()
            .all(|(key, value)| e.get(key).is_some_and(|ev| is_subset(value, ev))),
        (Value::Array(d), Value::Array(e)) => {
            d.len() == e.len() && d.iter().zip(e).all(|(dv, ev)| is_subset(dv, ev))
        }
        (d, e) => d == e,
    }
}

//! Owner reference resolution.
//!
//! An [`OwnerObject`] is either a typed resource, whose group/version/kind
//! is resolved through the `kube::Resource` trait, or a dynamic object
//! carrying its own `ApiResource`. Both variants expose the same metadata
//! accessors, so the rest of the pipeline never branches on which it got.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::core::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use kube::Resource;

use crate::error::OwnerResolutionError;

/// The object that owns everything produced by one applier configuration.
#[derive(Debug, Clone)]
pub enum OwnerObject {
    /// A registered typed resource; GVK comes from the type itself.
    Typed {
        gvk: GroupVersionKind,
        meta: ObjectMeta,
    },
    /// An unstructured object paired with its resolved API resource.
    Dynamic {
        object: DynamicObject,
        resource: ApiResource,
    },
}

impl OwnerObject {
    /// Capture a typed owner. The owner must already be persisted so its
    /// metadata carries the server-assigned uid.
    pub fn typed<K>(owner: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self::Typed {
            gvk: GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&())),
            meta: owner.meta().clone(),
        }
    }

    pub fn dynamic(object: DynamicObject, resource: ApiResource) -> Self {
        Self::Dynamic { object, resource }
    }

    fn meta(&self) -> &ObjectMeta {
        match self {
            Self::Typed { meta, .. } => meta,
            Self::Dynamic { object, .. } => &object.metadata,
        }
    }

    fn api_version(&self) -> String {
        match self {
            Self::Typed { gvk, .. } => gvk.api_version(),
            Self::Dynamic { resource, .. } => resource.api_version.clone(),
        }
    }

    fn kind(&self) -> Result<String, OwnerResolutionError> {
        let kind = match self {
            Self::Typed { gvk, .. } => gvk.kind.clone(),
            Self::Dynamic { object, resource } => object
                .types
                .as_ref()
                .map(|t| t.kind.clone())
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| resource.kind.clone()),
        };
        if kind.is_empty() {
            return Err(OwnerResolutionError::UnknownKind(
                self.meta().name.clone().unwrap_or_default(),
            ));
        }
        Ok(kind)
    }

    /// Compute the owner reference to stamp onto applied resources.
    ///
    /// The `controller` and `block_owner_deletion` flags are rendered as
    /// `Some(true)` when requested and absent otherwise, so a reference
    /// never carries an explicit `false`.
    pub fn owner_reference(
        &self,
        controller: bool,
        block_owner_deletion: bool,
    ) -> Result<OwnerReference, OwnerResolutionError> {
        let kind = self.kind()?;
        let meta = self.meta();
        let name = meta
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| OwnerResolutionError::MissingName { kind: kind.clone() })?;
        let uid = meta
            .uid
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| OwnerResolutionError::MissingUid {
                kind: kind.clone(),
                name: name.clone(),
            })?;

        Ok(OwnerReference {
            api_version: self.api_version(),
            kind,
            name,
            uid,
            controller: controller.then_some(true),
            block_owner_deletion: block_owner_deletion.then_some(true),
        })
    }
}

/// Owner configuration accepted by the applier facade.
#[derive(Debug, Clone)]
pub struct OwnerSpec {
    pub object: OwnerObject,
    pub controller: bool,
    pub block_owner_deletion: bool,
}

impl OwnerSpec {
    pub fn reference(&self) -> Result<OwnerReference, OwnerResolutionError> {
        self.object
            .owner_reference(self.controller, self.block_owner_deletion)
    }
}

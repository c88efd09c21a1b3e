//! Decoded resource model.

use kube::core::GroupVersionKind;
use serde_json::Value;

/// Kind of the resource that registers new custom resource types.
pub const SCHEMA_DEFINITION_KIND: &str = "CustomResourceDefinition";

/// API group of [`SCHEMA_DEFINITION_KIND`].
pub const SCHEMA_DEFINITION_GROUP: &str = "apiextensions.k8s.io";

/// Identity of a single manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdent {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceIdent {
    /// API group, empty for the core group.
    pub fn group(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        }
    }

    pub fn version(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((_, version)) => version,
            None => &self.api_version,
        }
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(self.group(), self.version(), &self.kind)
    }
}

impl std::fmt::Display for ResourceIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} {}/{}", self.api_version, self.kind, ns, self.name),
            None => write!(f, "{}/{} {}", self.api_version, self.kind, self.name),
        }
    }
}

/// One structured document from a rendered manifest stream.
#[derive(Debug, Clone)]
pub struct DecodedResource {
    pub ident: ResourceIdent,
    /// Full structured body, exactly as decoded.
    pub body: Value,
}

impl DecodedResource {
    /// True when this document registers a custom resource type rather
    /// than instantiating one.
    pub fn is_schema_definition(&self) -> bool {
        self.ident.kind == SCHEMA_DEFINITION_KIND && self.ident.group() == SCHEMA_DEFINITION_GROUP
    }

    /// The `(group, kind)` a schema definition serves, read from
    /// `spec.group` and `spec.names.kind`. `None` for instance documents
    /// or malformed definitions.
    pub fn served_group_kind(&self) -> Option<(String, String)> {
        if !self.is_schema_definition() {
            return None;
        }
        let group = self.body.pointer("/spec/group")?.as_str()?;
        let kind = self.body.pointer("/spec/names/kind")?.as_str()?;
        Some((group.to_string(), kind.to_string()))
    }
}

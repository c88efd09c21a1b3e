//! Multi-document manifest decoding.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::DecodeError;
use crate::resource::{DecodedResource, ResourceIdent};

/// Decode a rendered manifest stream into resources, preserving document
/// order.
///
/// Order is semantically meaningful: later documents may depend on
/// earlier ones. Empty documents are skipped. Any malformed document
/// aborts the whole batch so callers never apply a subset of a broken
/// manifest set.
pub fn decode_manifests(bytes: &[u8]) -> Result<Vec<DecodedResource>, DecodeError> {
    let mut resources = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_slice(bytes).enumerate() {
        let value =
            Value::deserialize(document).map_err(|source| DecodeError::Yaml { index, source })?;
        if value.is_null() {
            continue;
        }

        let api_version = string_field(&value, "/apiVersion");
        let kind = string_field(&value, "/kind");
        if api_version.is_empty() || kind.is_empty() {
            return Err(DecodeError::MissingTypeInfo { index });
        }

        let name = string_field(&value, "/metadata/name");
        if name.is_empty() {
            return Err(DecodeError::MissingName { index, kind });
        }

        let namespace = Some(string_field(&value, "/metadata/namespace"))
            .filter(|ns| !ns.is_empty());

        debug!("Decoded document {}: {}/{} {}", index, api_version, kind, name);
        resources.push(DecodedResource {
            ident: ResourceIdent {
                api_version,
                kind,
                namespace,
                name,
            },
            body: value,
        });
    }
    Ok(resources)
}

fn string_field(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

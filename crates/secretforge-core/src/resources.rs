//! Built-in key/value resources: secrets and config maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bytes::ByteString;
use crate::meta::{GroupVersionKind, ObjectMeta, Resource};

/// Secret type used when a derived secret does not declare one.
pub const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// A secret: binary `data` plus write-convenience `stringData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default = "Secret::default_api_version")]
    pub api_version: String,
    #[serde(default = "Secret::default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, ByteString>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}

impl Secret {
    fn default_api_version() -> String {
        "v1".to_string()
    }

    fn default_kind() -> String {
        "Secret".to_string()
    }

    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            ..Default::default()
        }
    }

    /// Whether `key` is present in either payload class.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key) || self.string_data.contains_key(key)
    }
}

impl Resource for Secret {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new("", "v1", "Secret")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// A config map: text `data` plus `binaryData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    #[serde(default = "ConfigMap::default_api_version")]
    pub api_version: String,
    #[serde(default = "ConfigMap::default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, ByteString>,
}

impl ConfigMap {
    fn default_api_version() -> String {
        "v1".to_string()
    }

    fn default_kind() -> String {
        "ConfigMap".to_string()
    }

    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            ..Default::default()
        }
    }
}

impl Resource for ConfigMap {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new("", "v1", "ConfigMap")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

//! Template evaluation context.
//!
//! Each reference is flattened into one key/value view. Values keep their
//! class: config map `data` and secret `stringData` entries are text, config
//! map `binaryData` and secret `data` entries are raw bytes.

use std::borrow::Cow;
use std::collections::BTreeMap;

use minijinja::Value;
use secretforge_core::{ConfigMap, Secret};

use crate::references::ResolvedReferences;

/// One value of a reference view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl RefValue {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Text form; invalid UTF-8 is replaced, never rejected.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

impl From<&RefValue> for Value {
    fn from(value: &RefValue) -> Self {
        match value {
            RefValue::Text(text) => Value::from(text.as_str()),
            RefValue::Bytes(bytes) => Value::from_bytes(bytes.clone()),
        }
    }
}

/// Flattened key/value view of one reference.
pub type ReferenceView = BTreeMap<String, RefValue>;

/// `data` first, `binaryData` wins on duplicate keys.
pub fn config_map_view(config_map: &ConfigMap) -> ReferenceView {
    let mut view: ReferenceView = config_map
        .data
        .iter()
        .map(|(k, v)| (k.clone(), RefValue::Text(v.clone())))
        .collect();
    for (k, v) in &config_map.binary_data {
        view.insert(k.clone(), RefValue::Bytes(v.to_vec()));
    }
    view
}

/// `data` first, `stringData` wins on duplicate keys.
pub fn secret_view(secret: &Secret) -> ReferenceView {
    let mut view: ReferenceView = secret
        .data
        .iter()
        .map(|(k, v)| (k.clone(), RefValue::Bytes(v.to_vec())))
        .collect();
    for (k, v) in &secret.string_data {
        view.insert(k.clone(), RefValue::Text(v.clone()));
    }
    view
}

/// Views of every resolved reference, keyed by reference name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    references: BTreeMap<String, ReferenceView>,
}

impl TemplateContext {
    pub fn from_references(refs: &ResolvedReferences) -> Self {
        let mut references = BTreeMap::new();
        for (name, config_map) in &refs.config_maps {
            references.insert(name.clone(), config_map_view(config_map));
        }
        for (name, secret) in &refs.secrets {
            references.insert(name.clone(), secret_view(secret));
        }
        Self { references }
    }

    pub fn get(&self, reference: &str) -> Option<&ReferenceView> {
        self.references.get(reference)
    }

    /// The value bound to `references` inside templates.
    pub fn to_value(&self) -> Value {
        let references: BTreeMap<String, Value> = self
            .references
            .iter()
            .map(|(name, view)| {
                let entries: BTreeMap<String, Value> = view
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect();
                (name.clone(), Value::from(entries))
            })
            .collect();
        Value::from(references)
    }
}

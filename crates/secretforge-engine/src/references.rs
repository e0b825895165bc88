//! The fetched sources a derivation runs against.

use indexmap::IndexMap;
use secretforge_core::{ConfigMap, Secret};

/// Sources fetched for a derived secret, keyed by reference name.
///
/// Insertion order is the declaration order of the references. Optional
/// references whose source was missing are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedReferences {
    pub config_maps: IndexMap<String, ConfigMap>,
    pub secrets: IndexMap<String, Secret>,
}

impl ResolvedReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_map(mut self, name: impl Into<String>, config_map: ConfigMap) -> Self {
        self.config_maps.insert(name.into(), config_map);
        self
    }

    pub fn with_secret(mut self, name: impl Into<String>, secret: Secret) -> Self {
        self.secrets.insert(name.into(), secret);
        self
    }

    /// Whether a reference with this name was resolved, of either kind.
    pub fn contains(&self, name: &str) -> bool {
        self.config_maps.contains_key(name) || self.secrets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.config_maps.len() + self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config_maps.is_empty() && self.secrets.is_empty()
    }

    /// Names of all resolved references, config maps first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.config_maps
            .keys()
            .chain(self.secrets.keys())
            .map(String::as_str)
    }
}

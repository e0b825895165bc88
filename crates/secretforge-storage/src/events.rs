//! Change notifications emitted by stores that support watching.

use secretforge_core::{ConfigMap, DerivedSecret, ObjectKey, Resource, Secret};

/// A stored object of any watched kind.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchedObject {
    ConfigMap(ConfigMap),
    Secret(Secret),
    DerivedSecret(DerivedSecret),
}

impl WatchedObject {
    pub fn key(&self) -> ObjectKey {
        match self {
            Self::ConfigMap(cm) => cm.key(),
            Self::Secret(s) => s.key(),
            Self::DerivedSecret(ds) => ds.key(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMap(_) => "ConfigMap",
            Self::Secret(_) => "Secret",
            Self::DerivedSecret(_) => "DerivedSecret",
        }
    }
}

/// Emitted after a successful write.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The object was created or updated; carries the new state.
    Applied(WatchedObject),
    /// The object was deleted; carries its last state.
    Deleted(WatchedObject),
}

impl WatchEvent {
    pub fn object(&self) -> &WatchedObject {
        match self {
            Self::Applied(obj) | Self::Deleted(obj) => obj,
        }
    }
}

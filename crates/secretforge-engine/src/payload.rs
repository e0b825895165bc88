use std::collections::{BTreeMap, BTreeSet};

use secretforge_core::ByteString;

/// The computed content of a generated secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedPayload {
    pub string_data: BTreeMap<String, String>,
    pub data: BTreeMap<String, ByteString>,
    /// Output keys whose existing value must not be replaced.
    pub preserve: BTreeSet<String>,
}

impl DerivedPayload {
    pub fn is_empty(&self) -> bool {
        self.string_data.is_empty() && self.data.is_empty()
    }

    /// Number of keys across both classes.
    pub fn len(&self) -> usize {
        self.string_data.len() + self.data.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.string_data.contains_key(key) || self.data.contains_key(key)
    }

    pub fn is_preserved(&self, key: &str) -> bool {
        self.preserve.contains(key)
    }
}

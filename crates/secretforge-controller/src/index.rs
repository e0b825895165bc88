//! Reverse-reference index.
//!
//! Maps each source object to the derived secrets that reference it, so a
//! change to a config map or secret can be routed to its dependents. Keys are
//! namespace-qualified; references always resolve in the tracked resource's
//! own namespace.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use secretforge_core::{
    DerivedSecret, ObjectKey, ProvenanceIdentity, Resource, Secret, SourceKind, SourceSelection,
};

/// A referenced source object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub key: ObjectKey,
}

impl SourceRef {
    pub fn new(kind: SourceKind, key: ObjectKey) -> Self {
        Self { kind, key }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    /// Tracked resource -> sources it references
    by_owner: HashMap<ObjectKey, HashSet<SourceRef>>,
    /// Source -> tracked resources referencing it
    by_source: HashMap<SourceRef, HashSet<ObjectKey>>,
}

impl IndexState {
    fn unlink(&mut self, owner: &ObjectKey) {
        let Some(sources) = self.by_owner.remove(owner) else {
            return;
        };
        for source in sources {
            if let Some(owners) = self.by_source.get_mut(&source) {
                owners.remove(owner);
                if owners.is_empty() {
                    self.by_source.remove(&source);
                }
            }
        }
    }
}

/// Thread-safe reverse index of source references.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    state: RwLock<IndexState>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources declared by `derived`, resolved in its namespace.
    pub fn sources_of(derived: &DerivedSecret) -> HashSet<SourceRef> {
        let namespace = &derived.metadata.namespace;
        derived
            .spec
            .references
            .iter()
            .filter_map(|reference| match reference.selection() {
                SourceSelection::One(kind, selector) => Some(SourceRef::new(
                    kind,
                    ObjectKey::new(namespace, &selector.name),
                )),
                SourceSelection::Missing | SourceSelection::Ambiguous => None,
            })
            .collect()
    }

    /// Replaces the entries of `derived` with its current references.
    pub fn upsert(&self, derived: &DerivedSecret) {
        let owner = derived.key();
        let sources = Self::sources_of(derived);
        let mut state = self.state.write();
        state.unlink(&owner);
        for source in &sources {
            state
                .by_source
                .entry(source.clone())
                .or_default()
                .insert(owner.clone());
        }
        state.by_owner.insert(owner, sources);
    }

    pub fn remove(&self, owner: &ObjectKey) {
        self.state.write().unlink(owner);
    }

    /// Tracked resources that reference the given source, sorted.
    pub fn dependents(&self, kind: SourceKind, key: &ObjectKey) -> Vec<ObjectKey> {
        let source = SourceRef::new(kind, key.clone());
        let state = self.state.read();
        let mut owners: Vec<ObjectKey> = state
            .by_source
            .get(&source)
            .map(|owners| owners.iter().cloned().collect())
            .unwrap_or_default();
        owners.sort();
        owners
    }

    /// The tracked resource that produced `secret`, if it is a generated secret.
    pub fn owner_of(secret: &Secret) -> Option<ObjectKey> {
        ProvenanceIdentity::of_artifact(secret)
            .filter(|identity| identity.gvk == DerivedSecret::gvk())
            .map(|identity| identity.owner_key())
    }

    /// Number of indexed tracked resources.
    pub fn len(&self) -> usize {
        self.state.read().by_owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

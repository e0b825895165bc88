//! Provenance identity: which tracked resource produced a generated secret.
//!
//! A generated secret records its producer either structurally, through a
//! controller owner reference (only possible inside one namespace), or through
//! the `derived-from` label set (always stamped, and the only option across
//! namespaces). [`ProvenanceIdentity::of_artifact`] normalizes both into one
//! value so cleanup and watch routing share a single lookup.

use std::collections::BTreeMap;
use std::fmt;

use crate::meta::{GroupVersionKind, ObjectKey, OwnerReference, Resource};
use crate::resources::Secret;

pub const DERIVED_FROM_NAME_LABEL: &str = "secretforge.io/derived-from.name";
pub const DERIVED_FROM_NAMESPACE_LABEL: &str = "secretforge.io/derived-from.namespace";
pub const DERIVED_FROM_GROUP_LABEL: &str = "secretforge.io/derived-from.group";
pub const DERIVED_FROM_VERSION_LABEL: &str = "secretforge.io/derived-from.version";
pub const DERIVED_FROM_KIND_LABEL: &str = "secretforge.io/derived-from.kind";

/// `(group, version, kind, namespace, name)` of the owning resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProvenanceIdentity {
    pub gvk: GroupVersionKind,
    pub namespace: String,
    pub name: String,
}

impl ProvenanceIdentity {
    pub fn of<R: Resource>(owner: &R) -> Self {
        let meta = owner.meta();
        Self {
            gvk: R::gvk(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        }
    }

    pub fn owner_key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// The five provenance labels stamped on generated secrets.
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (DERIVED_FROM_NAME_LABEL.to_string(), self.name.clone()),
            (DERIVED_FROM_NAMESPACE_LABEL.to_string(), self.namespace.clone()),
            (DERIVED_FROM_GROUP_LABEL.to_string(), self.gvk.group.clone()),
            (DERIVED_FROM_VERSION_LABEL.to_string(), self.gvk.version.clone()),
            (DERIVED_FROM_KIND_LABEL.to_string(), self.gvk.kind.clone()),
        ])
    }

    /// Reads the label set back. All five labels must be present.
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Option<Self> {
        let get = |key: &str| labels.get(key).cloned();
        Some(Self {
            gvk: GroupVersionKind::new(
                get(DERIVED_FROM_GROUP_LABEL)?,
                get(DERIVED_FROM_VERSION_LABEL)?,
                get(DERIVED_FROM_KIND_LABEL)?,
            ),
            namespace: get(DERIVED_FROM_NAMESPACE_LABEL)?,
            name: get(DERIVED_FROM_NAME_LABEL)?,
        })
    }

    /// Identity implied by a controller owner reference on an object in `namespace`.
    pub fn from_owner_reference(owner: &OwnerReference, namespace: &str) -> Option<Self> {
        let gvk = GroupVersionKind::from_api_version(&owner.api_version, &owner.kind).ok()?;
        Some(Self {
            gvk,
            namespace: namespace.to_string(),
            name: owner.name.clone(),
        })
    }

    /// Producer of `secret`: controller owner link first, label set otherwise.
    pub fn of_artifact(secret: &Secret) -> Option<Self> {
        let meta = &secret.metadata;
        meta.controller_owner()
            .and_then(|owner| Self::from_owner_reference(owner, &meta.namespace))
            .or_else(|| Self::from_labels(&meta.labels))
    }
}

impl fmt::Display for ProvenanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.gvk.group, self.gvk.version, self.gvk.kind, self.namespace, self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived_secret::{DerivedSecret, DerivedSecretSpec};
    use crate::meta::ObjectMeta;

    fn tracked() -> DerivedSecret {
        DerivedSecret::new(ObjectMeta::new("team-a", "creds"), DerivedSecretSpec::default())
    }

    #[test]
    fn test_labels_roundtrip() {
        let identity = ProvenanceIdentity::of(&tracked());
        let labels = identity.labels();
        assert_eq!(labels.len(), 5);
        assert_eq!(ProvenanceIdentity::from_labels(&labels), Some(identity));
    }

    #[test]
    fn test_partial_labels_are_rejected() {
        let mut labels = ProvenanceIdentity::of(&tracked()).labels();
        labels.remove(DERIVED_FROM_KIND_LABEL);
        assert_eq!(ProvenanceIdentity::from_labels(&labels), None);
    }

    #[test]
    fn test_owner_link_and_labels_normalize_to_same_identity() {
        let ds = tracked();
        let identity = ProvenanceIdentity::of(&ds);

        let mut owned = Secret::new(ObjectMeta::new("team-a", "out"));
        owned.metadata.owner_references.push(OwnerReference {
            api_version: "secretforge.io/v1alpha1".into(),
            kind: "DerivedSecret".into(),
            name: "creds".into(),
            uid: "uid-1".into(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        });

        let mut labelled = Secret::new(ObjectMeta::new("team-b", "out"));
        labelled.metadata.labels = identity.labels();

        assert_eq!(ProvenanceIdentity::of_artifact(&owned), Some(identity.clone()));
        assert_eq!(ProvenanceIdentity::of_artifact(&labelled), Some(identity));
        assert_eq!(
            ProvenanceIdentity::of_artifact(&Secret::new(ObjectMeta::new("x", "y"))),
            None
        );
    }

    #[test]
    fn test_display() {
        let identity = ProvenanceIdentity::of(&tracked());
        assert_eq!(
            identity.to_string(),
            "secretforge.io/v1alpha1/DerivedSecret/team-a/creds"
        );
    }
}

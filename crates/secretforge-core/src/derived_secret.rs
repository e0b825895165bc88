//! The `DerivedSecret` resource: a user-authored request describing how to
//! derive a secret from config maps and secrets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bytes::ByteString;
use crate::meta::{GroupVersionKind, ObjectKey, ObjectMeta, Resource};
use crate::time::Timestamp;

pub const GROUP: &str = "secretforge.io";
pub const VERSION: &str = "v1alpha1";
pub const KIND: &str = "DerivedSecret";

/// Default for [`Target::overwrite`].
pub const DEFAULT_TARGET_OVERWRITE: bool = true;
/// Default for [`Target::is_map`].
pub const DEFAULT_IS_MAP: bool = false;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSecret {
    #[serde(default = "DerivedSecret::default_api_version")]
    pub api_version: String,
    #[serde(default = "DerivedSecret::default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DerivedSecretSpec,
    #[serde(default)]
    pub status: DerivedSecretStatus,
}

impl DerivedSecret {
    fn default_api_version() -> String {
        format!("{GROUP}/{VERSION}")
    }

    fn default_kind() -> String {
        KIND.to_string()
    }

    pub fn new(metadata: ObjectMeta, spec: DerivedSecretSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
            status: DerivedSecretStatus::default(),
        }
    }

    /// Identity of the generated secret. Name and namespace default to the
    /// derived secret's own.
    pub fn target_key(&self) -> ObjectKey {
        ObjectKey::new(
            non_empty_or(self.spec.target_namespace.as_deref(), &self.metadata.namespace),
            non_empty_or(self.spec.target_name.as_deref(), &self.metadata.name),
        )
    }

    pub fn target_type(&self, default: &str) -> String {
        non_empty_or(self.spec.target_type.as_deref(), default).to_string()
    }

    /// Whether the target secret lives outside this resource's namespace.
    pub fn is_cross_namespace(&self) -> bool {
        self.target_key().namespace != self.metadata.namespace
    }

    /// Names of secrets declared as references.
    pub fn referenced_secrets(&self) -> impl Iterator<Item = &str> {
        self.spec
            .references
            .iter()
            .filter_map(|r| r.secret_ref.as_ref().map(|s| s.name.as_str()))
    }

    /// Names of config maps declared as references.
    pub fn referenced_config_maps(&self) -> impl Iterator<Item = &str> {
        self.spec
            .references
            .iter()
            .filter_map(|r| r.config_map_ref.as_ref().map(|s| s.name.as_str()))
    }
}

fn non_empty_or<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

impl Resource for DerivedSecret {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new(GROUP, VERSION, KIND)
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSecretSpec {
    /// Named sources available to templates and prefab rules. Names must be unique.
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Service account (in this resource's namespace) used to write secrets into
    /// another namespace.
    #[serde(
        default,
        alias = "serviceAccountName",
        skip_serializing_if = "Option::is_none"
    )]
    pub writer_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    /// Binary-valued targets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, BinaryTarget>,
    /// String-valued targets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, StringTarget>,
    /// Bulk copy rules; when set, `data` and `stringData` are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefab: Option<Prefabs>,
}

/// Which kind of object a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    ConfigMap,
    Secret,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMap => write!(f, "ConfigMap"),
            Self::Secret => write!(f, "Secret"),
        }
    }
}

/// Name of a source object plus whether its absence is tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSelector {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

impl SourceSelector {
    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<SourceSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SourceSelector>,
}

/// Outcome of inspecting which selectors a reference populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelection<'a> {
    One(SourceKind, &'a SourceSelector),
    Missing,
    Ambiguous,
}

impl Reference {
    pub fn config_map(name: impl Into<String>, source: impl Into<String>, optional: bool) -> Self {
        Self {
            name: name.into(),
            config_map_ref: Some(SourceSelector {
                name: source.into(),
                optional: Some(optional),
            }),
            secret_ref: None,
        }
    }

    pub fn secret(name: impl Into<String>, source: impl Into<String>, optional: bool) -> Self {
        Self {
            name: name.into(),
            config_map_ref: None,
            secret_ref: Some(SourceSelector {
                name: source.into(),
                optional: Some(optional),
            }),
        }
    }

    pub fn selection(&self) -> SourceSelection<'_> {
        match (&self.config_map_ref, &self.secret_ref) {
            (Some(cm), None) => SourceSelection::One(SourceKind::ConfigMap, cm),
            (None, Some(s)) => SourceSelection::One(SourceKind::Secret, s),
            (None, None) => SourceSelection::Missing,
            (Some(_), Some(_)) => SourceSelection::Ambiguous,
        }
    }
}

/// Derivation rule for a single output key.
///
/// `L` is the literal type of the payload class: `String` for `stringData`,
/// [`ByteString`] for `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target<L> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<L>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_map: Option<bool>,
}

impl<L> Default for Target<L> {
    fn default() -> Self {
        Self {
            template: None,
            literal: None,
            overwrite: None,
            is_map: None,
        }
    }
}

impl<L> Target<L> {
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Default::default()
        }
    }

    pub fn literal(literal: impl Into<L>) -> Self {
        Self {
            literal: Some(literal.into()),
            ..Default::default()
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn with_is_map(mut self, is_map: bool) -> Self {
        self.is_map = Some(is_map);
        self
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite.unwrap_or(DEFAULT_TARGET_OVERWRITE)
    }

    pub fn is_map(&self) -> bool {
        self.is_map.unwrap_or(DEFAULT_IS_MAP)
    }

    /// Template source, empty when unset.
    pub fn template_source(&self) -> &str {
        self.template.as_deref().unwrap_or("")
    }
}

pub type StringTarget = Target<String>;
pub type BinaryTarget = Target<ByteString>;

/// Keys to take from (or leave out of) one reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSubset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_keys: Option<bool>,
}

impl ReferenceSubset {
    pub fn all_keys(&self) -> bool {
        self.all_keys.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefabs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_all: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy_including: Vec<ReferenceSubset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy_excluding: Vec<ReferenceSubset>,
}

impl Prefabs {
    pub fn copy_all(&self) -> bool {
        self.copy_all.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSecretStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_namespace: Option<String>,
    /// Message of the last failed reconciliation; empty after a success.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: secretforge.io/v1alpha1
kind: DerivedSecret
metadata:
  name: app-creds
  namespace: team-a
spec:
  serviceAccountName: writer
  targetNamespace: team-b
  references:
    - name: db
      secretRef:
        name: postgres
    - name: settings
      configMapRef:
        name: app-settings
        optional: true
  data:
    cert:
      literal: aGVsbG8=
  stringData:
    url:
      template: "postgres://{{ references.db.user }}@host"
      overwrite: false
"#;

    #[test]
    fn test_parse_manifest() {
        let ds: DerivedSecret = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(ds.spec.writer_identity.as_deref(), Some("writer"));
        assert_eq!(ds.spec.references.len(), 2);
        assert_eq!(ds.spec.data["cert"].literal.as_ref().unwrap().as_slice(), b"hello");
        let url = &ds.spec.string_data["url"];
        assert!(!url.overwrite());
        assert!(!url.is_map());
        assert!(ds.status.error.is_empty());
    }

    #[test]
    fn test_target_key_defaults() {
        let mut ds: DerivedSecret = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(ds.target_key(), ObjectKey::new("team-b", "app-creds"));
        assert!(ds.is_cross_namespace());

        ds.spec.target_namespace = Some(String::new());
        ds.spec.target_name = Some("renamed".into());
        assert_eq!(ds.target_key(), ObjectKey::new("team-a", "renamed"));
        assert!(!ds.is_cross_namespace());
    }

    #[test]
    fn test_target_type_default() {
        let ds: DerivedSecret = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(ds.target_type("Opaque"), "Opaque");
    }

    #[test]
    fn test_reference_selection() {
        let cm = Reference::config_map("a", "cm", false);
        assert!(matches!(
            cm.selection(),
            SourceSelection::One(SourceKind::ConfigMap, _)
        ));

        let none = Reference {
            name: "b".into(),
            ..Default::default()
        };
        assert_eq!(none.selection(), SourceSelection::Missing);

        let mut both = Reference::secret("c", "s", false);
        both.config_map_ref = Some(SourceSelector::default());
        assert_eq!(both.selection(), SourceSelection::Ambiguous);
    }

    #[test]
    fn test_referenced_names() {
        let ds: DerivedSecret = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(ds.referenced_secrets().collect::<Vec<_>>(), vec!["postgres"]);
        assert_eq!(
            ds.referenced_config_maps().collect::<Vec<_>>(),
            vec!["app-settings"]
        );
    }

    #[test]
    fn test_status_serialization_omits_empty_error() {
        let status = DerivedSecretStatus {
            artifact_name: Some("x".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({"artifactName": "x"}));
    }
}

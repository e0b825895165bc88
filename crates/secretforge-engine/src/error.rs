//! Derivation errors.
//!
//! Every variant names the key and/or reference that caused it, since the
//! message is what ends up in the tracked resource's status.

use std::fmt;

use thiserror::Error;

/// Which explicit target map a key was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetField {
    /// `spec.data`, binary valued.
    Data,
    /// `spec.stringData`, string valued.
    StringData,
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("spec.data"),
            Self::StringData => f.write_str("spec.stringData"),
        }
    }
}

/// The bulk copy rule being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefabMode {
    CopyAll,
    CopyIncluding,
    CopyExcluding,
}

impl fmt::Display for PrefabMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CopyAll => f.write_str("copyAll"),
            Self::CopyIncluding => f.write_str("copyIncluding"),
            Self::CopyExcluding => f.write_str("copyExcluding"),
        }
    }
}

/// Errors raised while computing a payload. All of them are fatal for the
/// reconciliation that hit them.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error(
        "prefab {mode}: key {key} from reference {reference} collides with the same key from reference {previous}"
    )]
    PrefabCollision {
        mode: PrefabMode,
        key: String,
        reference: String,
        previous: String,
    },

    #[error("prefab {mode}: reference {reference} is not declared in spec.references")]
    UndeclaredReference { mode: PrefabMode, reference: String },

    #[error("prefab {mode}: reference {reference} does not exist")]
    UnresolvedReference { mode: PrefabMode, reference: String },

    #[error(
        "Key {key} appeared in multiple locations between data, stringData, and the output of map templates"
    )]
    KeyCollision { key: String },

    #[error("failed to parse template for {field}[{key}]: {source}")]
    TemplateParse {
        field: TargetField,
        key: String,
        source: minijinja::Error,
    },

    #[error("failed to render template for {field}[{key}]: {source}")]
    TemplateRender {
        field: TargetField,
        key: String,
        source: minijinja::Error,
    },

    #[error("output of map template for {field}[{key}] is not a key/value mapping: {message}")]
    MalformedMap {
        field: TargetField,
        key: String,
        message: String,
    },

    #[error("output of template for {field}[{key}] is not valid base64: {source}")]
    Base64 {
        field: TargetField,
        key: String,
        source: base64::DecodeError,
    },
}

impl DeriveError {
    /// Whether the error comes from the shape of the resource rather than from
    /// the data it processed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UndeclaredReference { .. })
    }

    /// The target key the error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::PrefabCollision { key, .. }
            | Self::KeyCollision { key }
            | Self::TemplateParse { key, .. }
            | Self::TemplateRender { key, .. }
            | Self::MalformedMap { key, .. }
            | Self::Base64 { key, .. } => Some(key),
            Self::UndeclaredReference { .. } | Self::UnresolvedReference { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_messages_name_key_and_references() {
        let err = DeriveError::PrefabCollision {
            mode: PrefabMode::CopyAll,
            key: "k".into(),
            reference: "second".into(),
            previous: "first".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("copyAll"));
        assert!(msg.contains("k"));
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));

        let err = DeriveError::KeyCollision { key: "token".into() };
        assert_eq!(
            err.to_string(),
            "Key token appeared in multiple locations between data, stringData, and the output of map templates"
        );
        assert_eq!(err.key(), Some("token"));
    }

    #[test]
    fn test_configuration_classification() {
        let err = DeriveError::UndeclaredReference {
            mode: PrefabMode::CopyIncluding,
            reference: "ghost".into(),
        };
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ghost"));
        assert!(!DeriveError::KeyCollision { key: "k".into() }.is_configuration());
    }
}

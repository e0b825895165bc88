//! Object store error types.
//!
//! This module defines all error types that can occur during store operations.

use std::fmt;

/// Errors that can occur during object store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind of the missing object.
        kind: String,
        /// `namespace/name` of the missing object.
        key: String,
    },

    /// The object changed since it was read (optimistic concurrency failure).
    #[error("Conflict on {kind} {key}: expected resourceVersion {expected}, found {actual}")]
    VersionConflict {
        kind: String,
        key: String,
        /// The resource version the writer read.
        expected: String,
        /// The resource version currently stored.
        actual: String,
    },

    /// Attempted to create an object that already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: String },

    /// The acting identity may not perform the operation.
    #[error("{identity} cannot {verb} {kind} in namespace {namespace}")]
    Forbidden {
        identity: String,
        verb: String,
        kind: String,
        namespace: String,
    },

    /// The object data is invalid.
    #[error("Invalid object: {message}")]
    InvalidObject { message: String },

    /// Failed to reach the backing store.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(
        kind: impl Into<String>,
        key: impl fmt::Display,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::VersionConflict {
            kind: kind.into(),
            key: key.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(
        identity: impl fmt::Display,
        verb: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::Forbidden {
            identity: identity.to_string(),
            verb: verb.into(),
            kind: kind.into(),
            namespace: namespace.into(),
        }
    }

    /// Creates a new `InvalidObject` error.
    #[must_use]
    pub fn invalid_object(message: impl Into<String>) -> Self {
        Self::InvalidObject {
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::Forbidden { .. } => ErrorCategory::Permission,
            Self::InvalidObject { .. } => ErrorCategory::Validation,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Object not found.
    NotFound,
    /// Conflict (version or existence).
    Conflict,
    /// Permission denied for the acting identity.
    Permission,
    /// Validation error.
    Validation,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Permission => write!(f, "permission"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

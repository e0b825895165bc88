//! Reconciliation errors.

use secretforge_core::{ObjectKey, SourceKind};
use secretforge_engine::DeriveError;
use secretforge_storage::{ErrorCategory, StoreError};
use thiserror::Error;

/// Result type for pipeline stages.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Pipeline stage family an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource itself is invalid; retrying will not help until it is edited.
    Configuration,
    /// A source could not be fetched.
    Resolution,
    /// The payload could not be computed from the sources.
    Derivation,
    /// Writing the generated secret failed.
    Apply,
    /// Writing the tracked resource's status failed.
    Status,
}

/// Fatal failure of one reconciliation. The message is what lands in
/// `status.error`.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reference name {0} is declared more than once")]
    DuplicateReference(String),

    #[error("reference {0} does not specify a source")]
    MissingSource(String),

    #[error("reference {0} specifies more than one source")]
    AmbiguousSource(String),

    #[error(
        "target namespace {target_namespace} differs from {namespace} but spec.writerIdentity is not set"
    )]
    MissingWriterIdentity {
        namespace: String,
        target_namespace: String,
    },

    #[error("failed to create client impersonating {identity}: {source}")]
    Impersonation { identity: String, source: StoreError },

    #[error("failed to fetch {kind} {name} for reference {reference}: {source}")]
    ReferenceFetch {
        reference: String,
        kind: SourceKind,
        name: String,
        source: StoreError,
    },

    #[error("{kind} {name} for reference {reference} not found")]
    ReferenceNotFound {
        reference: String,
        kind: SourceKind,
        name: String,
    },

    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error("secret {target} is already controlled by {owner_kind} {owner_name}")]
    AlreadyOwned {
        target: ObjectKey,
        owner_kind: String,
        owner_name: String,
    },

    #[error("failed to write secret {target}: {source}")]
    Apply { target: ObjectKey, source: StoreError },

    #[error("failed to update status of {key}: {source}")]
    StatusUpdate { key: ObjectKey, source: StoreError },

    #[error("failed to fetch {key}: {source}")]
    Fetch { key: ObjectKey, source: StoreError },
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateReference(_)
            | Self::MissingSource(_)
            | Self::AmbiguousSource(_)
            | Self::MissingWriterIdentity { .. }
            | Self::Impersonation { .. } => ErrorKind::Configuration,
            Self::Derive(err) if err.is_configuration() => ErrorKind::Configuration,
            Self::ReferenceFetch { .. } | Self::ReferenceNotFound { .. } | Self::Fetch { .. } => {
                ErrorKind::Resolution
            }
            Self::Derive(_) => ErrorKind::Derivation,
            Self::AlreadyOwned { .. } | Self::Apply { .. } => ErrorKind::Apply,
            Self::StatusUpdate { .. } => ErrorKind::Status,
        }
    }

    /// Whether the failure may clear up without anyone editing a resource,
    /// e.g. a write conflict or an unreachable store.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ReferenceFetch { source, .. }
            | Self::Apply { source, .. }
            | Self::StatusUpdate { source, .. }
            | Self::Fetch { source, .. } => matches!(
                source.category(),
                ErrorCategory::Conflict | ErrorCategory::Infrastructure | ErrorCategory::Internal
            ),
            _ => false,
        }
    }
}

use thiserror::Error;

/// Core error types for resource model operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid apiVersion: {0}")]
    InvalidApiVersion(String),

    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Time parsing error: {0}")]
    TimeError(#[from] time::error::Parse),

    #[error("Invalid resource data: {message}")]
    InvalidResource { message: String },
}

impl CoreError {
    /// Create a new InvalidApiVersion error
    pub fn invalid_api_version(api_version: impl Into<String>) -> Self {
        Self::InvalidApiVersion(api_version.into())
    }

    /// Create a new InvalidObjectKey error
    pub fn invalid_object_key(key: impl Into<String>) -> Self {
        Self::InvalidObjectKey(key.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(timestamp: impl Into<String>) -> Self {
        Self::InvalidTimestamp(timestamp.into())
    }

    /// Create a new InvalidResource error
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidApiVersion(_) | Self::InvalidObjectKey(_) | Self::InvalidTimestamp(_) => {
                ErrorCategory::Validation
            }
            Self::InvalidResource { .. } => ErrorCategory::Validation,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::TimeError(_) => ErrorCategory::System,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Serialization,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

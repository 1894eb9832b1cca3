//! Domain error types
//!
//! This module defines the error hierarchy for sitepush. Errors are
//! domain-specific and don't expose third-party client types.

use thiserror::Error;

/// Main sitepush error type
///
/// This is the primary error type used throughout the library. A `DeployError`
/// returned from an invocation is fatal for that invocation; per-file failures
/// never surface here.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Remote backend errors (S3, BunnyCDN, GitHub)
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Page ledger or run state storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Errors raised by remote deployment backends
///
/// Inside the per-file transfer loop any of these leaves the page pending.
/// Transient variants are also retried in place by the HTTP clients.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Failed to reach the remote service
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Repository could not be created, deleted or accessed
    #[error("Repository setup failed: {0}")]
    RepositorySetup(String),

    /// Bulk directory sync failed
    #[error("Directory sync failed: {0}")]
    DirectorySync(String),

    /// A single object or blob write failed
    #[error("Upload failed for {path}: {message}")]
    UploadFailed { path: String, message: String },

    /// Tree or commit creation failed
    #[error("Finalization failed: {0}")]
    Finalization(String),

    /// Remote returned an unexpected payload
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },
}

impl BackendError {
    /// Build an error from a non-success HTTP status and response body
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => BackendError::AuthenticationFailed(format!("{status} - {message}")),
            400..=499 => BackendError::ClientError { status, message },
            _ => BackendError::ServerError { status, message },
        }
    }

    /// Whether a later invocation may succeed without operator intervention
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::ConnectionFailed(_)
                | BackendError::UploadFailed { .. }
                | BackendError::ServerError { .. }
        )
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => BackendError::from_status(status.as_u16(), err.to_string()),
            None => BackendError::ConnectionFailed(err.to_string()),
        }
    }
}

impl From<object_store::Error> for BackendError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => {
                BackendError::AuthenticationFailed(err.to_string())
            }
            other => BackendError::ConnectionFailed(other.to_string()),
        }
    }
}

impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        DeployError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        DeployError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DeployError {
    fn from(err: toml::de::Error) -> Self {
        DeployError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<tokio_postgres::Error> for DeployError {
    fn from(err: tokio_postgres::Error) -> Self {
        DeployError::Storage(err.to_string())
    }
}

//! Error types for EventIntel.
//!
//! Library crates use [`EventIntelError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Unparseable model output is *not* an error: stages turn it into
//! [`crate::Degraded`] data. Only service, storage, config and validation
//! failures travel through this type.

use std::path::PathBuf;

/// Top-level error type for all EventIntel operations.
#[derive(Debug, thiserror::Error)]
pub enum EventIntelError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// An external service (generation or embedding runtime) failed or is unreachable.
    #[error("{service} service error: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    /// An external call did not complete within its time budget.
    #[error("{service} call timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input or an invariant violation on the pipeline state.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EventIntelError>;

impl EventIntelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a service error for the named external service.
    pub fn service(service: &'static str, msg: impl Into<String>) -> Self {
        Self::Service {
            service,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means an external collaborator (generation service,
    /// embedding service, or the document store) failed.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Self::Service { .. } | Self::Timeout { .. } | Self::Storage(_)
        )
    }
}

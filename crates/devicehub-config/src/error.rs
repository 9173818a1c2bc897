//! Error types for configuration operations.
//!
//! # Design
//! - Constant messages; context travels in structured fields.
//! - Sources are preserved so callers can log the full chain once.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A required field was absent or empty.
    #[error("missing configuration field")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// A settings document was not valid JSON.
    #[error("invalid settings document")]
    Parse {
        /// Document that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The merged settings did not match the expected shape.
    #[error("invalid settings values")]
    Decode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// An environment override could not be interpreted.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Environment variable name.
        name: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Raw value supplied.
        value: String,
    },
    /// Scanner kind value was invalid.
    #[error("invalid scanner kind")]
    InvalidScanner {
        /// Scanner kind supplied by the caller.
        value: String,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: Option<String>) -> Self {
        Self::InvalidField {
            field,
            reason,
            value,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

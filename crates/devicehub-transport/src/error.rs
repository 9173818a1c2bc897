//! # Design
//!
//! - Construction failures are typed; per-request failures never surface as
//!   errors and are folded into [`crate::Delivery`] instead.
//! - Constant messages with structured context, sources preserved.

use thiserror::Error;

/// Result type for transport construction.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while building the ingestion client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be built.
    #[error("failed to build http client")]
    BuildClient {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// A header value contained characters HTTP does not allow.
    #[error("invalid header value")]
    InvalidHeader {
        /// Header that failed validation.
        header: &'static str,
    },
    /// The endpoint URL failed validation.
    #[error("invalid ingestion endpoint")]
    InvalidEndpoint {
        /// Underlying configuration error.
        source: devicehub_config::ConfigError,
    },
}

//! # Design
//!
//! - Provide a single crate-level error type for ingestion server bootstrap/serve failures.
//! - Keep error messages constant; capture operational context in structured fields.
//! - Preserve sources for diagnostics without double-logging.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

use devicehub_telemetry::TelemetryError;

/// Result alias for ingestion server operations.
pub type IngestResult<T> = std::result::Result<T, IngestServerError>;

/// Errors raised while bootstrapping or serving the ingestion endpoint.
#[derive(Debug)]
pub enum IngestServerError {
    /// Binding the listener failed.
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Serving requests failed.
    Serve {
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Configured bind address could not be parsed.
    InvalidBindAddr {
        /// Raw value supplied.
        value: String,
    },
    /// Logging or metrics could not be initialised.
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying telemetry error.
        source: TelemetryError,
    },
    /// An environment setting could not be interpreted.
    InvalidSetting {
        /// Environment variable name.
        name: &'static str,
        /// Raw value supplied.
        value: String,
    },
}

impl Display for IngestServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { .. } => formatter.write_str("failed to bind ingest listener"),
            Self::Serve { .. } => formatter.write_str("ingest server terminated unexpectedly"),
            Self::InvalidBindAddr { .. } => formatter.write_str("invalid ingest bind address"),
            Self::InvalidSetting { .. } => formatter.write_str("invalid ingest setting"),
            Self::Telemetry { .. } => formatter.write_str("ingest telemetry initialisation failed"),
        }
    }
}

impl Error for IngestServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } | Self::Serve { source } => Some(source),
            Self::Telemetry { source, .. } => Some(source),
            Self::InvalidBindAddr { .. } | Self::InvalidSetting { .. } => None,
        }
    }
}

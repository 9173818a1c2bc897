//! # Design
//!
//! - Centralize application-level errors for bootstrap and shutdown.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use devicehub_config::ConfigError;
use devicehub_outbox::OutboxError;
use devicehub_telemetry::TelemetryError;
use devicehub_transport::TransportError;
use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// Outbox operations failed.
    #[error("outbox operation failed")]
    Outbox {
        /// Operation identifier.
        operation: &'static str,
        /// Source outbox error.
        source: OutboxError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: TelemetryError,
    },
    /// Transport construction failed.
    #[error("transport operation failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Source transport error.
        source: TransportError,
    },
    /// A background task panicked or was aborted.
    #[error("background task failed")]
    TaskJoin {
        /// Task name.
        task: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn outbox(operation: &'static str, source: OutboxError) -> Self {
        Self::Outbox { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: TelemetryError) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn transport(operation: &'static str, source: TransportError) -> Self {
        Self::Transport { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "settings.load",
            ConfigError::MissingField {
                field: "graphql_url",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let outbox = AppError::outbox(
            "outbox.enqueue",
            OutboxError::DuplicateKey {
                event_id: "e-1".to_string(),
            },
        );
        assert!(matches!(outbox, AppError::Outbox { .. }));

        let transport = AppError::transport(
            "transport.new",
            TransportError::InvalidHeader {
                header: "x-api-key",
            },
        );
        assert_eq!(transport.to_string(), "transport operation failed");
    }
}

//! Failures raised while wiring relay logging and metrics.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step at which a metric failed to reach the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStage {
    /// Descriptor rejected (bad name, help or labels).
    Build,
    /// Registry refused the collector, usually a duplicate name.
    Register,
}

impl MetricStage {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Register => "register",
        }
    }
}

/// Errors raised by the telemetry crate.
#[derive(Debug)]
pub enum TelemetryError {
    /// A global log subscriber was already installed in this process.
    LoggingInstalled {
        /// Subscriber installation error.
        source: TryInitError,
    },
    /// A relay metric could not be added to the registry.
    Metric {
        /// Metric name.
        metric: &'static str,
        /// Step that failed.
        stage: MetricStage,
        /// Prometheus error.
        source: PrometheusError,
    },
    /// The registry could not be rendered for a scrape.
    Render {
        /// Prometheus error.
        source: PrometheusError,
    },
}

impl TelemetryError {
    pub(crate) const fn metric(
        metric: &'static str,
        stage: MetricStage,
        source: PrometheusError,
    ) -> Self {
        Self::Metric {
            metric,
            stage,
            source,
        }
    }
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::LoggingInstalled { .. } => "relay logging already initialised",
            Self::Metric { .. } => "relay metric setup failed",
            Self::Render { .. } => "metrics scrape rendering failed",
        })
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LoggingInstalled { source } => Some(source),
            Self::Metric { source, .. } | Self::Render { source } => Some(source),
        }
    }
}

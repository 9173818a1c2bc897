//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Outbox gauges (depth, oldest pending age, max attempts) make events that
//!   retry forever visible to operators.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::core::Collector;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{MetricStage, Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

struct MetricsInner {
    registry: Registry,
    scans_captured_total: IntCounterVec,
    capture_files_total: IntCounterVec,
    dispatch_cycles_total: IntCounterVec,
    events_sent_total: IntCounter,
    event_send_failures_total: IntCounter,
    transport_retries_total: IntCounter,
    outbox_pending: IntGauge,
    outbox_oldest_pending_age_seconds: IntGauge,
    outbox_max_attempts: IntGauge,
    config_refresh_total: IntCounterVec,
    config_fetch_latency_ms: IntGauge,
    ingest_requests_total: IntCounterVec,
}

/// Outcome label recorded for each capture stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Stimulus passed the debounce window and was emitted.
    Emitted,
    /// Stimulus was suppressed by the debounce window.
    Debounced,
    /// Outbox already held the event identifier.
    Duplicate,
}

impl CaptureOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Emitted => "emitted",
            Self::Debounced => "debounced",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Outcome label recorded for each dispatcher cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleLabel {
    /// Nothing was pending.
    Idle,
    /// At least one event reached the remote endpoint.
    Delivered,
    /// Events were pending but none were delivered.
    Stalled,
    /// The cycle could not read the outbox.
    Errored,
}

impl CycleLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Delivered => "delivered",
            Self::Stalled => "stalled",
            Self::Errored => "errored",
        }
    }
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Events currently waiting in the outbox.
    pub outbox_pending: i64,
    /// Age in seconds of the oldest pending event.
    pub outbox_oldest_pending_age_seconds: i64,
    /// Highest attempt count among pending events.
    pub outbox_max_attempts: i64,
    /// Events acknowledged by the remote endpoint.
    pub events_sent_total: u64,
    /// Individual send attempts that did not end in acceptance.
    pub event_send_failures_total: u64,
    /// Transient transport faults that triggered a backoff retry.
    pub transport_retries_total: u64,
    /// Configuration refreshes applied to the live snapshot.
    pub config_refresh_applied_total: u64,
    /// Configuration refreshes that kept the previous snapshot.
    pub config_refresh_failed_total: u64,
    /// Latest latency (ms) of a configuration fetch.
    pub config_fetch_latency_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let scans_captured_total = counter_vec(
            &registry,
            "scans_captured_total",
            "Capture stimuli by outcome",
            &["outcome"],
        )?;
        let capture_files_total = counter_vec(
            &registry,
            "capture_files_total",
            "Capture artifacts routed to the processed or error side-channel",
            &["status"],
        )?;
        let dispatch_cycles_total = counter_vec(
            &registry,
            "dispatch_cycles_total",
            "Dispatcher cycles by outcome",
            &["outcome"],
        )?;
        let events_sent_total = counter(
            &registry,
            "events_sent_total",
            "Events acknowledged by the ingestion endpoint",
        )?;
        let event_send_failures_total = counter(
            &registry,
            "event_send_failures_total",
            "Event deliveries that were rejected or abandoned",
        )?;
        let transport_retries_total = counter(
            &registry,
            "transport_retries_total",
            "Transient transport faults retried with backoff",
        )?;
        let outbox_pending = gauge(&registry, "outbox_pending", "Events waiting for delivery")?;
        let outbox_oldest_pending_age_seconds = gauge(
            &registry,
            "outbox_oldest_pending_age_seconds",
            "Age of the oldest pending event in seconds",
        )?;
        let outbox_max_attempts = gauge(
            &registry,
            "outbox_max_attempts",
            "Highest delivery attempt count among pending events",
        )?;
        let config_refresh_total = counter_vec(
            &registry,
            "config_refresh_total",
            "Device configuration refreshes by status",
            &["status"],
        )?;
        let config_fetch_latency_ms = gauge(
            &registry,
            "config_fetch_latency_ms",
            "Time taken by the latest device configuration fetch (ms)",
        )?;
        let ingest_requests_total = counter_vec(
            &registry,
            "ingest_requests_total",
            "Requests answered by the ingestion endpoint",
            &["operation", "code"],
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                scans_captured_total,
                capture_files_total,
                dispatch_cycles_total,
                events_sent_total,
                event_send_failures_total,
                transport_retries_total,
                outbox_pending,
                outbox_oldest_pending_age_seconds,
                outbox_max_attempts,
                config_refresh_total,
                config_fetch_latency_ms,
                ingest_requests_total,
            }),
        })
    }

    /// Count a capture stimulus by outcome.
    pub fn inc_capture(&self, outcome: CaptureOutcome) {
        self.inner
            .scans_captured_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Count a capture artifact routed to a side-channel (`processed` or `error`).
    pub fn inc_capture_file(&self, status: &str) {
        self.inner
            .capture_files_total
            .with_label_values(&[status])
            .inc();
    }

    /// Count a dispatcher cycle by outcome.
    pub fn inc_dispatch_cycle(&self, outcome: CycleLabel) {
        self.inner
            .dispatch_cycles_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Count an event acknowledged by the remote endpoint.
    pub fn inc_event_sent(&self) {
        self.inner.events_sent_total.inc();
    }

    /// Count a delivery attempt that did not end in acceptance.
    pub fn inc_send_failure(&self) {
        self.inner.event_send_failures_total.inc();
    }

    /// Count a transient transport retry.
    pub fn inc_transport_retry(&self) {
        self.inner.transport_retries_total.inc();
    }

    /// Publish the latest outbox statistics.
    pub fn set_outbox_gauges(&self, pending: i64, oldest_pending_age: Duration, max_attempts: i64) {
        self.inner.outbox_pending.set(pending);
        self.inner
            .outbox_oldest_pending_age_seconds
            .set(i64::try_from(oldest_pending_age.as_secs()).unwrap_or(i64::MAX));
        self.inner.outbox_max_attempts.set(max_attempts);
    }

    /// Count a configuration refresh (`applied` or `failed`).
    pub fn inc_config_refresh(&self, status: &str) {
        self.inner
            .config_refresh_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record the observed latency of a configuration fetch.
    pub fn observe_config_fetch_latency(&self, duration: Duration) {
        self.inner
            .config_fetch_latency_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Count one ingestion request by GraphQL operation (or endpoint) and status code.
    pub fn inc_ingest_request(&self, operation: &str, status: u16) {
        self.inner
            .ingest_requests_total
            .with_label_values(&[operation, &status.to_string()])
            .inc();
    }

    /// Read an ingestion request counter; intended for tests.
    #[must_use]
    pub fn ingest_request_count(&self, operation: &str, status: u16) -> u64 {
        self.inner
            .ingest_requests_total
            .with_label_values(&[operation, &status.to_string()])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be encoded.
    pub fn render(&self) -> Result<String> {
        TextEncoder::new()
            .encode_to_string(&self.inner.registry.gather())
            .map_err(|source| TelemetryError::Render { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let refresh = |status: &str| {
            self.inner
                .config_refresh_total
                .with_label_values(&[status])
                .get()
        };
        MetricsSnapshot {
            outbox_pending: self.inner.outbox_pending.get(),
            outbox_oldest_pending_age_seconds: self.inner.outbox_oldest_pending_age_seconds.get(),
            outbox_max_attempts: self.inner.outbox_max_attempts.get(),
            events_sent_total: self.inner.events_sent_total.get(),
            event_send_failures_total: self.inner.event_send_failures_total.get(),
            transport_retries_total: self.inner.transport_retries_total.get(),
            config_refresh_applied_total: refresh("applied"),
            config_refresh_failed_total: refresh("failed"),
            config_fetch_latency_ms: self.inner.config_fetch_latency_ms.get(),
        }
    }

    /// Read a capture counter; intended for health reporting and tests.
    #[must_use]
    pub fn capture_count(&self, outcome: CaptureOutcome) -> u64 {
        self.inner
            .scans_captured_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    /// Read a dispatcher cycle counter; intended for health reporting and tests.
    #[must_use]
    pub fn dispatch_cycle_count(&self, outcome: CycleLabel) -> u64 {
        self.inner
            .dispatch_cycles_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn register<C>(registry: &Registry, name: &'static str, built: prometheus::Result<C>) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    let collector = built.map_err(|source| TelemetryError::metric(name, MetricStage::Build, source))?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::metric(name, MetricStage::Register, source))?;
    Ok(collector)
}

fn counter(registry: &Registry, name: &'static str, help: &str) -> Result<IntCounter> {
    register(registry, name, IntCounter::with_opts(Opts::new(name, help)))
}

fn counter_vec(
    registry: &Registry,
    name: &'static str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec> {
    register(registry, name, IntCounterVec::new(Opts::new(name, help), labels))
}

fn gauge(registry: &Registry, name: &'static str, help: &str) -> Result<IntGauge> {
    register(registry, name, IntGauge::with_opts(Opts::new(name, help)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_capture(CaptureOutcome::Emitted);
        metrics.inc_capture(CaptureOutcome::Debounced);
        metrics.inc_capture(CaptureOutcome::Debounced);
        metrics.inc_capture_file("processed");
        metrics.inc_dispatch_cycle(CycleLabel::Stalled);
        metrics.inc_event_sent();
        metrics.inc_send_failure();
        metrics.inc_transport_retry();
        metrics.set_outbox_gauges(3, Duration::from_secs(90), 4);
        metrics.inc_config_refresh("applied");
        metrics.inc_config_refresh("failed");
        metrics.observe_config_fetch_latency(Duration::from_millis(45));
        metrics.inc_ingest_request("sendScan", 200);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.outbox_pending, 3);
        assert_eq!(snapshot.outbox_oldest_pending_age_seconds, 90);
        assert_eq!(snapshot.outbox_max_attempts, 4);
        assert_eq!(snapshot.events_sent_total, 1);
        assert_eq!(snapshot.event_send_failures_total, 1);
        assert_eq!(snapshot.transport_retries_total, 1);
        assert_eq!(snapshot.config_refresh_applied_total, 1);
        assert_eq!(snapshot.config_refresh_failed_total, 1);
        assert_eq!(snapshot.config_fetch_latency_ms, 45);
        assert_eq!(metrics.capture_count(CaptureOutcome::Debounced), 2);
        assert_eq!(metrics.dispatch_cycle_count(CycleLabel::Stalled), 1);
        assert_eq!(metrics.dispatch_cycle_count(CycleLabel::Idle), 0);
        assert_eq!(metrics.ingest_request_count("sendScan", 200), 1);
        Ok(())
    }

    #[test]
    fn registration_failures_name_the_metric_and_stage() {
        let registry = Registry::new();
        assert!(gauge(&registry, "outbox_pending", "depth").is_ok());
        let duplicate = gauge(&registry, "outbox_pending", "depth");
        assert!(matches!(
            duplicate,
            Err(TelemetryError::Metric {
                metric: "outbox_pending",
                stage: MetricStage::Register,
                ..
            })
        ));
        let invalid = counter(&registry, "not a metric", "bad name");
        assert!(matches!(
            invalid,
            Err(TelemetryError::Metric {
                stage: MetricStage::Build,
                ..
            })
        ));
    }

    #[test]
    fn render_emits_registered_families() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_dispatch_cycle(CycleLabel::Idle);
        let rendered = metrics.render()?;
        assert!(rendered.contains("dispatch_cycles_total"));
        assert!(rendered.contains("outbox_pending"));
        Ok(())
    }
}

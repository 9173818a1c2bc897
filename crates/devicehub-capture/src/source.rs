//! Capture source lifecycle.
//!
//! # Design
//! - `start` and `stop` are idempotent; a second `start` while running is a no-op.
//! - Each run owns a fresh debounce cache and a child cancellation token, so a
//!   stopped source can be started again without leaking the old task.
//! - A source whose channel closed reports itself as no longer running.

use devicehub_config::{AppSettings, LiveConfig, ScannerKind};
use devicehub_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::emitter::ScanEmitter;
use crate::folder::FolderWatcher;
use crate::model::CapturedScan;
use crate::simulated::SimulatedScanner;

/// Which stimulus generator drives the source.
#[derive(Debug, Clone)]
pub enum CaptureDriver {
    /// Watch-folder polling.
    Folder(FolderWatcher),
    /// Random `BT-` codes.
    Simulated(SimulatedScanner),
}

impl CaptureDriver {
    /// Driver selected by the relay settings.
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        match settings.scanner {
            ScannerKind::FileWatcher => Self::Folder(FolderWatcher::new(&settings.watch_folder)),
            ScannerKind::Simulated => Self::Simulated(SimulatedScanner::default()),
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Folder(_) => "file_watcher",
            Self::Simulated(_) => "simulated",
        }
    }
}

#[derive(Debug)]
struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A startable, stoppable capture source feeding the bounded channel.
#[derive(Debug)]
pub struct CaptureSource {
    driver: CaptureDriver,
    device_id: String,
    live: LiveConfig,
    sender: mpsc::Sender<CapturedScan>,
    metrics: Metrics,
    shutdown: CancellationToken,
    running: Option<Running>,
}

impl CaptureSource {
    /// Source emitting scans for `device_id` into `sender`.
    ///
    /// `shutdown` is the process-wide token; cancelling it also stops the source.
    #[must_use]
    pub fn new(
        driver: CaptureDriver,
        device_id: impl Into<String>,
        live: LiveConfig,
        sender: mpsc::Sender<CapturedScan>,
        metrics: Metrics,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            driver,
            device_id: device_id.into(),
            live,
            sender,
            metrics,
            shutdown,
            running: None,
        }
    }

    /// Start capturing. Returns `false` when already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        let cancel = self.shutdown.child_token();
        let emitter = ScanEmitter::new(
            self.device_id.clone(),
            self.live.clone(),
            self.sender.clone(),
            self.metrics.clone(),
        );
        let driver = self.driver.clone();
        let metrics = self.metrics.clone();
        let token = cancel.clone();
        info!(scanner = driver.label(), "capture source starting");
        let handle = tokio::spawn(async move {
            let result = match driver {
                CaptureDriver::Folder(watcher) => watcher.run(emitter, metrics, token).await,
                CaptureDriver::Simulated(scanner) => scanner.run(emitter, token).await,
            };
            if let Err(err) = result {
                warn!(error = %err, "capture source exited with error");
            }
        });
        self.running = Some(Running { cancel, handle });
        true
    }

    /// Stop capturing and wait for the task to finish. Returns `false` when
    /// nothing was running.
    pub async fn stop(&mut self) -> bool {
        let Some(Running { cancel, handle }) = self.running.take() else {
            return false;
        };
        cancel.cancel();
        if let Err(err) = handle.await {
            warn!(error = %err, "capture task did not shut down cleanly");
        }
        info!("capture source stopped");
        true
    }

    /// Whether a capture task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

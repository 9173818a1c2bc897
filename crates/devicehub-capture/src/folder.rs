//! Watch-folder capture source.
//!
//! # Design
//! - Polls the folder for `*.txt` drops rather than relying on OS notifications,
//!   so partially written files are handled by the settle delay and read retries.
//! - Each non-blank line of a file is one stimulus.
//! - A consumed file moves to `processed/`; an unreadable one moves to `error/`.
//!   Either destination overwrites a file of the same name.
//! - A consumed file that cannot be archived in `processed/` goes to `error/`
//!   instead; it must leave the watch folder or its lines would be captured again.
//! - A bad file never stops the source; only cancellation or a closed channel does.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use devicehub_telemetry::Metrics;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::emitter::ScanEmitter;
use crate::error::{CaptureError, CaptureResult};

const PROCESSED_DIR: &str = "processed";
const ERROR_DIR: &str = "error";
const CAPTURE_EXTENSION: &str = "txt";

/// Timing knobs for folder polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderOptions {
    /// Delay between folder scans.
    pub poll_interval: Duration,
    /// Wait after discovering a file before the first read.
    pub settle_delay: Duration,
    /// Read attempts before a file is declared unreadable.
    pub read_attempts: u32,
    /// Delay between read attempts.
    pub read_spacing: Duration,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_millis(150),
            read_attempts: 20,
            read_spacing: Duration::from_millis(200),
        }
    }
}

/// Where a capture file ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposition {
    /// Lines were offered and the file moved to `processed/`.
    Processed,
    /// The file could not be read or archived and moved to `error/`.
    Failed,
    /// The file vanished before it could be read, or capture was cancelled.
    Skipped,
}

/// Polls a folder for scan files.
#[derive(Debug, Clone)]
pub struct FolderWatcher {
    root: PathBuf,
    options: FolderOptions,
}

impl FolderWatcher {
    /// Watcher over `root` with default timings.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, FolderOptions::default())
    }

    /// Watcher over `root` with explicit timings.
    #[must_use]
    pub fn with_options(root: impl Into<PathBuf>, options: FolderOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    /// Folder being watched.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination for consumed files.
    #[must_use]
    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR)
    }

    /// Destination for unreadable files.
    #[must_use]
    pub fn error_dir(&self) -> PathBuf {
        self.root.join(ERROR_DIR)
    }

    /// Create the watch folder and its `processed/` and `error/` children.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub async fn prepare(&self) -> CaptureResult<()> {
        for dir in [self.root.clone(), self.processed_dir(), self.error_dir()] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| CaptureError::io("capture.prepare", &dir, source))?;
        }
        Ok(())
    }

    /// Capture files currently waiting in the folder, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be listed.
    pub async fn discover(&self) -> CaptureResult<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|source| CaptureError::io("capture.list", &self.root, source))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| CaptureError::io("capture.list", &self.root, source))?
        {
            let path = entry.path();
            let is_file = entry.file_type().await.is_ok_and(|kind| kind.is_file());
            if is_file && is_capture_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Poll until `cancel` fires or the channel closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the folders cannot be prepared.
    pub async fn run(
        self,
        mut emitter: ScanEmitter,
        metrics: Metrics,
        cancel: CancellationToken,
    ) -> CaptureResult<()> {
        self.prepare().await?;
        info!(folder = %self.root.display(), "folder capture started");

        loop {
            match self.discover().await {
                Ok(files) => {
                    for path in files {
                        if cancel.is_cancelled() {
                            break;
                        }
                        match self.process(&path, &mut emitter, &cancel).await {
                            Ok(disposition) => record(&metrics, disposition),
                            Err(CaptureError::ChannelClosed) => {
                                info!("capture channel closed; folder capture stopping");
                                return Ok(());
                            }
                            Err(err) => warn!(error = %err, path = %path.display(), "capture file handling failed"),
                        }
                    }
                }
                Err(err) => warn!(error = %err, "failed to scan watch folder"),
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
        info!("folder capture stopped");
        Ok(())
    }

    /// Read one file, offer its lines, and move it to its destination.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::ChannelClosed`] when the consumer is gone, or an
    /// IO error if the file cannot be moved.
    pub async fn process(
        &self,
        path: &Path,
        emitter: &mut ScanEmitter,
        cancel: &CancellationToken,
    ) -> CaptureResult<FileDisposition> {
        tokio::select! {
            () = cancel.cancelled() => return Ok(FileDisposition::Skipped),
            () = tokio::time::sleep(self.options.settle_delay) => {}
        }

        let contents = match self.read_with_retry(path).await {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!(path = %path.display(), "capture file vanished before read");
                return Ok(FileDisposition::Skipped);
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "capture file unreadable; moving to error folder");
                move_into(path, &self.error_dir()).await?;
                return Ok(FileDisposition::Failed);
            }
        };

        let mut offered = 0_usize;
        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            emitter.offer(line).await?;
            offered += 1;
        }
        if let Err(err) = move_into(path, &self.processed_dir()).await {
            warn!(error = %err, path = %path.display(), "capture file not archived; moving to error folder");
            move_into(path, &self.error_dir()).await?;
            return Ok(FileDisposition::Failed);
        }
        debug!(path = %path.display(), lines = offered, "capture file processed");
        Ok(FileDisposition::Processed)
    }

    async fn read_with_retry(&self, path: &Path) -> CaptureResult<Option<String>> {
        let attempts = self.options.read_attempts.max(1);
        let mut attempt = 1;
        loop {
            match fs::read_to_string(path).await {
                Ok(contents) => return Ok(Some(contents)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(source) if attempt >= attempts => {
                    return Err(CaptureError::ReadExhausted {
                        path: path.to_path_buf(),
                        attempts,
                        source,
                    });
                }
                Err(err) => {
                    debug!(error = %err, attempt, path = %path.display(), "capture file busy; retrying");
                    attempt += 1;
                    tokio::time::sleep(self.options.read_spacing).await;
                }
            }
        }
    }
}

fn record(metrics: &Metrics, disposition: FileDisposition) {
    match disposition {
        FileDisposition::Processed => metrics.inc_capture_file("processed"),
        FileDisposition::Failed => metrics.inc_capture_file("error"),
        FileDisposition::Skipped => {}
    }
}

fn is_capture_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CAPTURE_EXTENSION))
}

async fn move_into(path: &Path, dir: &Path) -> CaptureResult<PathBuf> {
    let Some(name) = path.file_name() else {
        return Err(CaptureError::io(
            "capture.move",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let destination = dir.join(name);
    match fs::remove_file(&destination).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(CaptureError::io("capture.replace", &destination, source)),
    }
    fs::rename(path, &destination)
        .await
        .map_err(|source| CaptureError::io("capture.move", path, source))?;
    Ok(destination)
}

//! # Design
//!
//! - Provide structured, constant-message errors for capture sources.
//! - Capture operation context (paths, attempts) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors produced by capture sources.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// IO failures while interacting with the watch folder.
    #[error("capture io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A capture file stayed unreadable after every retry.
    #[error("capture file unreadable")]
    ReadExhausted {
        /// File that could not be read.
        path: PathBuf,
        /// Attempts made before giving up.
        attempts: u32,
        /// Error from the final attempt.
        source: io::Error,
    },
    /// The consumer side of the capture channel is gone.
    #[error("capture channel closed")]
    ChannelClosed,
}

impl CaptureError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

//! Process-level span helpers.
//!
//! # Design
//! - One root span per process so every log line carries the run mode and build SHA.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the root span tagged with the supplied run mode and device identifier.
    #[must_use]
    pub fn new(mode: impl Into<String>, device_id: &str) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "devicehub",
            mode = %mode,
            device_id = %device_id,
            build_sha = %build_sha()
        )));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

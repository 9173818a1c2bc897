#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Scan capture for the DeviceHub relay.
//!
//! Layout: `model/` (captured payloads), `debounce.rs` (repeat suppression),
//! `emitter.rs` (bounded channel hand-off), `folder.rs` and `simulated.rs`
//! (stimulus generators), `source.rs` (start/stop lifecycle), `error.rs`.

pub mod debounce;
pub mod emitter;
pub mod error;
pub mod folder;
pub mod model;
pub mod simulated;
pub mod source;

pub use debounce::{Debouncer, normalise};
pub use emitter::ScanEmitter;
pub use error::{CaptureError, CaptureResult};
pub use folder::{FileDisposition, FolderOptions, FolderWatcher};
pub use model::{CapturedScan, EmitOutcome};
pub use simulated::SimulatedScanner;
pub use source::{CaptureDriver, CaptureSource};

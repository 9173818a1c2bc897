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

//! Relay settings and live device configuration.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (file + env layering),
//! `validate.rs` (checks), `live.rs` (hot-swappable device tunables),
//! `api_key.rs` (persisted ingestion key).

pub mod api_key;
mod defaults;
pub mod error;
pub mod live;
pub mod loader;
pub mod model;
pub mod validate;

pub use api_key::ApiKeyStore;
pub use defaults::{API_KEY_FILE, SETTINGS_FILE};
pub use error::{ConfigError, ConfigResult};
pub use live::LiveConfig;
pub use loader::SettingsLoader;
pub use model::{AppSettings, DeviceConfig, ScannerKind, redact_secrets};
pub use validate::{parse_endpoint_url, validate_device_config, validate_settings};

//! Layered settings loader.
//!
//! # Design
//! - Layers: base document, then environment-specific document, then process
//!   environment overrides. Later layers win.
//! - Documents are optional; a missing file is not an error.
//! - Environment lookups are injected so tests never mutate the process env.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::defaults::SETTINGS_FILE;
use crate::error::{ConfigError, ConfigResult};
use crate::model::AppSettings;
use crate::validate::validate_settings;

/// Environment variable selecting the settings directory.
pub const ENV_CONFIG_DIR: &str = "DEVICEHUB_CONFIG_DIR";
/// Environment variable selecting the environment-specific document.
pub const ENV_ENVIRONMENT: &str = "DEVICEHUB_ENV";

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Text,
    Unsigned,
}

const ENV_OVERRIDES: &[(&str, &str, EnvKind)] = &[
    ("DEVICEHUB_DEVICE_ID", "device_id", EnvKind::Text),
    ("DEVICEHUB_GRAPHQL_URL", "graphql_url", EnvKind::Text),
    ("DEVICEHUB_API_KEY", "graphql_api_key", EnvKind::Text),
    ("DEVICEHUB_WATCH_FOLDER", "watch_folder", EnvKind::Text),
    ("DEVICEHUB_DATABASE_PATH", "database_path", EnvKind::Text),
    ("DEVICEHUB_SCANNER", "scanner", EnvKind::Text),
    (
        "DEVICEHUB_CONFIG_FETCH_MINUTES",
        "config_fetch_minutes",
        EnvKind::Unsigned,
    ),
    (
        "DEVICEHUB_REQUEST_TIMEOUT_SECS",
        "request_timeout_secs",
        EnvKind::Unsigned,
    ),
    ("DEVICEHUB_LOG_LEVEL", "log_level", EnvKind::Text),
    ("DEVICEHUB_LOG_FORMAT", "log_format", EnvKind::Text),
];

/// Resolves [`AppSettings`] from a settings directory and the environment.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    dir: PathBuf,
    environment: Option<String>,
}

impl SettingsLoader {
    /// Loader reading documents from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            environment: None,
        }
    }

    /// Also read `appsettings.{environment}.json` on top of the base document.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        let environment = environment.into();
        self.environment = (!environment.trim().is_empty()).then_some(environment);
        self
    }

    /// Loader configured from `DEVICEHUB_CONFIG_DIR` and `DEVICEHUB_ENV`.
    #[must_use]
    pub fn from_env() -> Self {
        let dir = std::env::var(ENV_CONFIG_DIR).unwrap_or_else(|_| ".".to_string());
        let loader = Self::new(dir);
        match std::env::var(ENV_ENVIRONMENT) {
            Ok(environment) => loader.with_environment(environment),
            Err(_) => loader,
        }
    }

    /// Directory documents are read from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load and validate settings using the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be read or parsed, an override is
    /// malformed, or the merged settings fail validation.
    pub fn load(&self) -> ConfigResult<AppSettings> {
        self.load_with(|name| std::env::var(name).ok())
    }

    /// Load and validate settings using the supplied environment lookup.
    ///
    /// # Errors
    ///
    /// See [`SettingsLoader::load`].
    pub fn load_with<F>(&self, lookup: F) -> ConfigResult<AppSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut document = Value::Object(Map::new());
        for path in self.document_paths() {
            if let Some(layer) = read_document(&path)? {
                debug!(path = %path.display(), "merging settings document");
                merge(&mut document, layer);
            }
        }
        apply_env_overrides(&mut document, &lookup)?;

        let settings: AppSettings =
            serde_json::from_value(document).map_err(|source| ConfigError::Decode { source })?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    fn document_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.dir.join(SETTINGS_FILE)];
        if let Some(environment) = &self.environment {
            paths.push(self.dir.join(format!("appsettings.{environment}.json")));
        }
        paths
    }
}

fn read_document(path: &Path) -> ConfigResult<Option<Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ConfigError::io("settings.read", path, err)),
    };
    let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if !value.is_object() {
        return Err(ConfigError::invalid(
            "document",
            "not_an_object",
            Some(path.display().to_string()),
        ));
    }
    Ok(Some(value))
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge(existing, value);
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides<F>(document: &mut Value, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let Value::Object(map) = document else {
        return Ok(());
    };
    for &(name, field, kind) in ENV_OVERRIDES {
        let Some(raw) = lookup(name) else {
            continue;
        };
        let value = match kind {
            EnvKind::Text => Value::String(raw),
            EnvKind::Unsigned => {
                let parsed = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name,
                        reason: "not_unsigned_integer",
                        value: raw.clone(),
                    })?;
                Value::from(parsed)
            }
        };
        map.insert(field.to_string(), value);
    }
    Ok(())
}

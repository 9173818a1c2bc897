//! File-backed API key storage.
//!
//! # Design
//! - A key passed on the command line bootstraps the key file once; later
//!   starts read it back without the argument.
//! - The file is owner-readable only on Unix.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::defaults::API_KEY_FILE;
use crate::error::{ConfigError, ConfigResult};

/// Location of the persisted ingestion API key.
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    path: PathBuf,
}

impl ApiKeyStore {
    /// Store backed by an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by the default key file inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(API_KEY_FILE))
    }

    /// Path of the key file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn load(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(non_empty(&raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ConfigError::io("api_key.read", &self.path, err)),
        }
    }

    /// Persist `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn store(&self, key: &str) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| ConfigError::io("api_key.create_dir", parent, err))?;
        }
        fs::write(&self.path, key.trim().as_bytes())
            .await
            .map_err(|err| ConfigError::io("api_key.write", &self.path, err))?;
        restrict_permissions(&self.path).await?;
        info!(path = %self.path.display(), "stored ingestion API key");
        Ok(())
    }

    /// Resolve the key: a bootstrap argument wins (and is stored), then the
    /// configured value, then the key file.
    ///
    /// # Errors
    ///
    /// Returns an error if storing or reading the key file fails.
    pub async fn resolve(
        &self,
        configured: Option<&str>,
        bootstrap: Option<&str>,
    ) -> ConfigResult<Option<String>> {
        if let Some(key) = bootstrap.and_then(non_empty) {
            self.store(&key).await?;
            return Ok(Some(key));
        }
        if let Some(key) = configured.and_then(non_empty) {
            return Ok(Some(key));
        }
        self.load().await
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|err| ConfigError::io("api_key.chmod", path, err))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> ConfigResult<()> {
    Ok(())
}

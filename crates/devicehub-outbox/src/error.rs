//! Error types for the outbox store.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Result alias for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;

/// Errors raised by the outbox store.
#[derive(Debug)]
pub enum OutboxError {
    /// The database file could not be opened.
    OpenFailed {
        /// Database path.
        path: PathBuf,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// Migration execution failed.
    MigrationFailed {
        /// Underlying migration error.
        source: sqlx::migrate::MigrateError,
    },
    /// A database operation failed.
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// An event with the same identifier is already queued.
    DuplicateKey {
        /// Identifier that already exists.
        event_id: String,
    },
    /// A stored value could not be mapped back to the model.
    InvalidRow {
        /// Column holding the unexpected value.
        field: &'static str,
        /// Stored value.
        value: String,
    },
}

impl OutboxError {
    pub(crate) const fn query(operation: &'static str, source: sqlx::Error) -> Self {
        Self::QueryFailed { operation, source }
    }

    /// Whether the error reports an already-queued event.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

impl Display for OutboxError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed { .. } => formatter.write_str("failed to open outbox database"),
            Self::MigrationFailed { .. } => formatter.write_str("migration failed"),
            Self::QueryFailed { .. } => formatter.write_str("database operation failed"),
            Self::DuplicateKey { .. } => formatter.write_str("event already queued"),
            Self::InvalidRow { .. } => formatter.write_str("stored row could not be decoded"),
        }
    }
}

impl Error for OutboxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OpenFailed { source, .. } | Self::QueryFailed { source, .. } => Some(source),
            Self::MigrationFailed { source } => Some(source),
            Self::DuplicateKey { .. } | Self::InvalidRow { .. } => None,
        }
    }
}

impl From<sqlx::Error> for OutboxError {
    fn from(source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation: "sqlx operation",
            source,
        }
    }
}

//! Error types for Stereux Core
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by the subsystem that raises them (catalog, transfer,
//! materialization, playlist window, configuration).
//!
//! ## Error Taxonomy
//!
//! ### Catalog
//! - `EmptyCatalog` - the Songs table has no rows at all
//! - `RecordNotFound` - lookup miss for an id (gaps left by deleted rows)
//! - `InsufficientCatalog` - not enough unique entries to fill a window. This
//!   is the only error meant to reach an end user.
//!
//! ### Transfer / Materialization
//! - `NetworkError`, `Timeout`, `UnexpectedStatusCode`, `InvalidDownloadUrl`
//!   are raised by the transfer primitive
//! - `MaterializationFailed` wraps any of them once the media/artwork pair
//!   failed; the entry stays retryable
//! - `PersistenceWarning` is never returned as `Err` from a materialization,
//!   it travels inside `MaterializeOutcome` and is logged
//!
//! ### Internal
//! - `InvariantViolation` - the single-writer discipline was broken (for
//!   example a second `mark_in_progress` for the same entry)

use thiserror::Error;

/// Result type alias using our PlayerError type
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Main error type for Stereux Core
#[derive(Error, Debug)]
pub enum PlayerError {
    // ===== Catalog Errors =====

    /// The catalog has no rows
    #[error("Catalog is empty")]
    EmptyCatalog,

    /// Catalog lookup miss
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Catalog cannot fill a playlist window
    #[error("Catalog has too few unique songs (highest id {highest_id}, need {needed})")]
    InsufficientCatalog {
        highest_id: i64,
        needed: usize,
    },

    /// Entry has not been inserted into the catalog yet
    #[error("Catalog entry '{0}' has no id")]
    MissingId(String),

    // ===== Transfer Errors =====

    /// Network connectivity error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Server returned a non-success status code
    #[error("Server responded with unexpected status code {status_code} for {url}")]
    UnexpectedStatusCode {
        status_code: u16,
        url: String,
    },

    /// Malformed URL that could not be resolved against the source base URL
    #[error("Invalid download URL: {0}")]
    InvalidDownloadUrl(String),

    /// Operation timed out
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    // ===== Materialization Errors =====

    /// Media or artwork fetch failed; local paths were left unset
    #[error("Materialization of song {id} failed: {cause}")]
    MaterializationFailed {
        id: i64,
        cause: String,
    },

    /// Files are on disk but the catalog write of their paths was lost
    #[error("Local paths for song {id} were not persisted: {message}")]
    PersistenceWarning {
        id: i64,
        message: String,
    },

    // ===== Configuration/State Errors =====

    /// Configuration is invalid or incomplete
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal invariant broken
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

impl PlayerError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        PlayerError::RecordNotFound(resource.into())
    }

    /// Create an InvariantViolation with a message
    pub fn invariant<S: Into<String>>(message: S) -> Self {
        PlayerError::InvariantViolation(message.into())
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        PlayerError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Wrap any failure of the media/artwork pair for entry `id`
    pub fn materialization_failed(id: i64, cause: impl std::fmt::Display) -> Self {
        PlayerError::MaterializationFailed {
            id,
            cause: cause.to_string(),
        }
    }

    /// Check if error is retryable (network errors, timeouts, failed fetches)
    ///
    /// Returns `true` for errors where a later access attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlayerError::NetworkError { is_transient, .. } => *is_transient,
            PlayerError::Timeout(_) | PlayerError::MaterializationFailed { .. } => true,
            PlayerError::UnexpectedStatusCode { status_code, .. } => *status_code >= 500,
            PlayerError::ReqwestError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if error should be shown to an end user
    ///
    /// Media fetch failures are retried transparently on the next navigation,
    /// so only an undersized catalog surfaces.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, PlayerError::InsufficientCatalog { .. } | PlayerError::EmptyCatalog)
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::EmptyCatalog => {
                "There are no songs yet. Please import songs before playing.".to_string()
            }
            PlayerError::InsufficientCatalog { needed, .. } => {
                format!(
                    "There are not enough different songs to build a playlist (need {}). Please import more songs.",
                    needed
                )
            }
            PlayerError::MaterializationFailed { .. } | PlayerError::Timeout(_) => {
                "The song could not be downloaded. It will be retried automatically.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

//! Error taxonomy for sync runs.
//!
//! A missing remote path is not an error: [`crate::store::RemoteStore::get`]
//! returns `Ok(None)`. Rows lacking mandatory fields are not errors either;
//! they are counted as skipped. Everything else aborts the current run.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors surfaced by sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store answered outside the success range, or could not be reached.
    #[error("{method} {path} failed (status {status:?}): {message}")]
    Transport {
        method: &'static str,
        path: String,
        status: Option<u16>,
        message: String,
    },

    /// A chunk failed after earlier chunks of the same batch were stored.
    #[error("batch write to '{node}' stopped after {written} records; earlier chunks may have been written: {source}")]
    PartialBatch {
        node: String,
        written: usize,
        source: Box<SyncError>,
    },

    /// A column the operation depends on is absent from the source.
    #[error("source '{source_name}' is missing required columns: {}", columns.join(", "))]
    Schema {
        source_name: String,
        columns: Vec<String>,
    },

    /// A submitted subject title has no remote counterpart.
    #[error("subject '{0}' not found in the remote store")]
    UnknownSubject(String),

    /// A timeslot submission carried no usable timeslot.
    #[error("submission for '{0}' contains no timeslots")]
    EmptySubmission(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub(crate) fn transport(
        method: &'static str,
        path: &str,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            method,
            path: path.to_string(),
            status,
            message: message.into(),
        }
    }

    pub(crate) fn schema(source_name: &str, columns: Vec<String>) -> Self {
        Self::Schema {
            source_name: source_name.to_string(),
            columns,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

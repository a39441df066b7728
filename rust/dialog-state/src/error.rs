//! Error types for the state tracker.

use std::path::PathBuf;

use thiserror::Error;

/// The common error type used by this crate.
///
/// Only corpus-level and artifact-level failures surface here. Malformed
/// fields inside a turn degrade to empty values instead of producing errors,
/// and a dialogue that fails validation is skipped by the batch drivers
/// (see [`crate::report::BatchReport`]).
#[derive(Debug, Error)]
pub enum DialogStateError {
    /// A file could not be read or written
    #[error("I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be encoded or decoded
    #[error("Malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// A slot key was not of the form `domain-slot`
    #[error("Invalid slot identifier '{0}'")]
    InvalidSlot(String),

    /// A dialogue was not shaped as expected
    #[error("Invalid dialogue '{dialogue_id}': {reason}")]
    InvalidDialogue { dialogue_id: String, reason: String },
}

impl DialogStateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DialogStateError::Io {
            path: path.into(),
            source,
        }
    }
}

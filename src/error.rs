//! Error types for the notebook store.

use thiserror::Error;

/// Failures a store operation can report.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The operation referenced a notebook or note id that is not in the store.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A note was submitted with both title and text blank.
    #[error("note has neither a title nor text")]
    EmptyInput,

    /// The persisted record could not be parsed.
    #[error("stored data is corrupt: {0}")]
    CorruptState(#[source] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn notebook_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "notebook",
            id: id.to_string(),
        }
    }

    pub fn note_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "note",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

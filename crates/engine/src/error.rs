use formstitch_core::{CoreError, SubmissionId};
use formstitch_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("not found: {0}")]
    NotFound(String),

    /// A dynamic table or column the query needs is missing.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The header row was committed but its field values were not.
    #[error("submission {submission_id} was saved without its values: {reason}")]
    WriteError {
        submission_id: SubmissionId,
        reason: String,
    },

    #[error("invalid request: {0}")]
    Validation(String),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SchemaMismatch(msg) => EngineError::SchemaMismatch(msg),
            StorageError::NotFound(msg) => EngineError::NotFound(msg),
            other => EngineError::Storage(other),
        }
    }
}

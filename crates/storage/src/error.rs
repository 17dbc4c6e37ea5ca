use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A referenced table or column does not exist.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("core error: {0}")]
    Core(#[from] formstitch_core::CoreError),
}

impl StorageError {
    /// Sorts raw SQLite failures into the variants callers branch on.
    pub fn classify(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
            if msg.starts_with("no such table")
                || msg.starts_with("no such column")
                || msg.contains("has no column named")
            {
                return StorageError::SchemaMismatch(msg.clone());
            }
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return StorageError::ConstraintViolation(msg.clone());
            }
        }
        StorageError::Sqlite(err)
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, StorageError::SchemaMismatch(_))
    }
}

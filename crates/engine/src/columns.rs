use formstitch_core::FieldValue;
use formstitch_storage::{RawRow, StorageError};

use crate::error::EngineError;

fn missing(name: &str) -> EngineError {
    EngineError::Storage(StorageError::Serialization(format!("missing column {name}")))
}

fn mistyped(name: &str, value: &FieldValue) -> EngineError {
    EngineError::Storage(StorageError::Serialization(format!(
        "unexpected value for column {name}: {value:?}"
    )))
}

pub(crate) fn int_column(row: &RawRow, name: &str) -> Result<i64, EngineError> {
    match row.get(name) {
        Some(FieldValue::Integer(n)) => Ok(*n),
        Some(other) => Err(mistyped(name, other)),
        None => Err(missing(name)),
    }
}

pub(crate) fn opt_int_column(row: &RawRow, name: &str) -> Result<Option<i64>, EngineError> {
    match row.get(name) {
        Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::Integer(n)) => Ok(Some(*n)),
        Some(other) => Err(mistyped(name, other)),
        None => Err(missing(name)),
    }
}

pub(crate) fn text_column(row: &RawRow, name: &str) -> Result<String, EngineError> {
    match row.get(name) {
        Some(FieldValue::Text(s)) => Ok(s.clone()),
        Some(FieldValue::Null) => Ok(String::new()),
        Some(other) => Err(mistyped(name, other)),
        None => Err(missing(name)),
    }
}

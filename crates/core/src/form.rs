use serde::{Deserialize, Serialize};

use crate::ids::{FieldId, FormId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub id: FormId,
    pub name: String,
    /// Identifier-safe slug; part of the dynamic table name.
    pub alias: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldId,
    pub label: String,
    /// Storage key, unique within the form; doubles as the dynamic column name.
    pub alias: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

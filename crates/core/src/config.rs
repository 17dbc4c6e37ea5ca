use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Engine configuration. Every field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prepended to every fixed and dynamic table name.
    pub table_prefix: String,
    /// Field types that carry no data and never get a dynamic column.
    pub excluded_field_types: Vec<String>,
    /// Page size used when a request carries no limit. `None` means unbounded.
    pub default_limit: Option<u32>,
    /// Key used for the count in ranked output.
    pub rank_count_alias: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            excluded_field_types: vec!["button".to_string(), "freetext".to_string()],
            default_limit: None,
            rank_count_alias: "submissions".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            table_prefix: prefix.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// The prefix ends up in raw SQL, so it must be identifier-safe.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CoreError::InvalidData(format!(
                "table prefix {:?} is not identifier-safe",
                self.table_prefix
            )));
        }
        Ok(())
    }

    pub fn is_excluded_type(&self, field_type: &str) -> bool {
        self.excluded_field_types.iter().any(|t| t == field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.table_prefix, "");
        assert!(config.is_excluded_type("button"));
        assert!(config.is_excluded_type("freetext"));
        assert!(!config.is_excluded_type("text"));
        assert_eq!(config.rank_count_alias, "submissions");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"table_prefix": "mt_"}"#).unwrap();
        assert_eq!(config.table_prefix, "mt_");
        assert_eq!(config.excluded_field_types.len(), 2);
    }

    #[test]
    fn rejects_unsafe_prefix() {
        assert!(EngineConfig::from_json_str(r#"{"table_prefix": "x; DROP"}"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_limit": 25}}"#).unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.default_limit, Some(25));
    }
}

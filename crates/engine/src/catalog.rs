use formstitch_core::{
    EngineConfig, FieldId, FieldValue, FormId, form::FieldDefinition, request::Direction,
};
use formstitch_storage::{Expr, QueryBuilder, RawStore};
use tracing::{debug, warn};

use crate::columns::{int_column, text_column};
use crate::error::EngineError;
use crate::locator::TableLocator;

/// Fixed columns of every result table. A field may not reuse these aliases.
pub const RESERVED_ALIASES: &[&str] = &["submission_id", "form_id"];

pub fn is_reserved_alias(alias: &str) -> bool {
    RESERVED_ALIASES.contains(&alias)
}

/// The data-carrying fields of one form, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCatalog {
    fields: Vec<FieldDefinition>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self { fields }
    }

    pub fn get(&self, alias: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.alias.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keeps only the fields for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&FieldDefinition) -> bool) {
        self.fields.retain(|f| keep(f));
    }
}

/// Loads the field catalog for `form_id`, skipping non-data field types.
/// A form without data fields yields an empty catalog, not an error.
pub fn resolve_fields<S: RawStore + ?Sized>(
    store: &S,
    locator: &TableLocator,
    config: &EngineConfig,
    form_id: FormId,
) -> Result<FieldCatalog, EngineError> {
    let mut q = QueryBuilder::new();
    q.select([
        "f.id AS id",
        "f.label AS label",
        "f.alias AS alias",
        "f.type AS field_type",
    ])
    .from(locator.form_fields(), "f")
    .and_where(Expr::raw(format!("f.form_id = {}", form_id.get())));

    let excluded: Vec<FieldValue> = config
        .excluded_field_types
        .iter()
        .map(|t| FieldValue::from(t.as_str()))
        .collect();
    let not_in = q.not_in_list("f.type", excluded);
    q.and_where(not_in)
        .order_by("f.field_order", Direction::Asc)
        .order_by("f.id", Direction::Asc);

    let rows = store.fetch(&q)?;
    let mut fields = Vec::with_capacity(rows.len());
    for row in &rows {
        let field = FieldDefinition {
            id: FieldId::new(int_column(row, "id")?),
            label: text_column(row, "label")?,
            alias: text_column(row, "alias")?,
            field_type: text_column(row, "field_type")?,
        };
        if is_reserved_alias(&field.alias) {
            warn!(form_id = %form_id, alias = %field.alias, "field alias collides with a fixed result column, skipping");
            continue;
        }
        fields.push(field);
    }
    debug!(form_id = %form_id, fields = fields.len(), "resolved field catalog");
    Ok(FieldCatalog::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: i64, alias: &str) -> FieldDefinition {
        FieldDefinition {
            id: FieldId::new(id),
            label: alias.to_uppercase(),
            alias: alias.to_string(),
            field_type: "text".to_string(),
        }
    }

    #[test]
    fn lookup_and_order() {
        let catalog = FieldCatalog::new(vec![field(2, "size"), field(1, "color")]);
        assert_eq!(catalog.aliases().collect::<Vec<_>>(), vec!["size", "color"]);
        assert_eq!(catalog.get("color").map(|f| f.id), Some(FieldId::new(1)));
        assert!(!catalog.contains("weight"));
    }

    #[test]
    fn retain_filters_fields() {
        let mut catalog = FieldCatalog::new(vec![field(1, "a"), field(2, "b")]);
        catalog.retain(|f| f.alias != "a");
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("b"));
    }

    #[test]
    fn fixed_result_columns_are_reserved() {
        assert!(is_reserved_alias("submission_id"));
        assert!(is_reserved_alias("form_id"));
        assert!(!is_reserved_alias("email"));
        assert!(!is_reserved_alias("form"));
    }
}

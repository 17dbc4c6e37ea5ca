use formstitch_core::{EngineConfig, FormId, form::Form};
use formstitch_storage::TableNames;

/// Physical name of a form's result table.
///
/// Pure in its inputs. The alias is not escaped here; callers guarantee it is an
/// identifier-safe slug, unique per form. Because `form_id` renders as digits and
/// is always followed by `_`, distinct `(form_id, alias)` pairs give distinct names.
pub fn table_name(prefix: &str, form_id: FormId, form_alias: &str) -> String {
    format!("{prefix}form_results_{form_id}_{form_alias}")
}

/// Single source of truth for every table name the engine touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocator {
    prefix: String,
    fixed: TableNames,
}

impl TableLocator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            fixed: TableNames::new(prefix),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.table_prefix)
    }

    pub fn form_results(&self, form_id: FormId, form_alias: &str) -> String {
        table_name(&self.prefix, form_id, form_alias)
    }

    pub fn for_form(&self, form: &Form) -> String {
        self.form_results(form.id, &form.alias)
    }

    pub fn forms(&self) -> &str {
        &self.fixed.forms
    }

    pub fn form_fields(&self) -> &str {
        &self.fixed.form_fields
    }

    pub fn submissions(&self) -> &str {
        &self.fixed.form_submissions
    }

    pub fn ip_addresses(&self) -> &str {
        &self.fixed.ip_addresses
    }

    pub fn pages(&self) -> &str {
        &self.fixed.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn name_shape() {
        assert_eq!(table_name("mt_", FormId::new(3), "contact"), "mt_form_results_3_contact");
        assert_eq!(table_name("", FormId::new(3), "contact"), "form_results_3_contact");
    }

    #[test]
    fn stable_across_calls() {
        let locator = TableLocator::new("mt_");
        let a = locator.form_results(FormId::new(12), "survey");
        let b = locator.form_results(FormId::new(12), "survey");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_pairs_do_not_collide() {
        let pairs = [
            (1, "2_x"),
            (12, "x"),
            (12, "_x"),
            (1, "2__x"),
            (11, "a"),
            (1, "1_a"),
            (1, "a"),
            (10, "a"),
        ];
        let names: HashSet<String> = pairs
            .iter()
            .map(|(id, alias)| table_name("", FormId::new(*id), alias))
            .collect();
        assert_eq!(names.len(), pairs.len());
    }

    #[test]
    fn fixed_tables_share_prefix() {
        let locator = TableLocator::from_config(&EngineConfig::with_prefix("mt_"));
        assert_eq!(locator.submissions(), "mt_form_submissions");
        assert_eq!(locator.ip_addresses(), "mt_ip_addresses");
        assert_eq!(locator.forms(), "mt_forms");
    }
}

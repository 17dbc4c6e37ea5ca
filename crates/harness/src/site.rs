use chrono::NaiveDateTime;
use formstitch_core::{
    CoreError, EngineConfig, FieldValue, FormId, SubmissionId,
    form::Form,
    submission::{IpAddress, NewSubmission, Page},
    timestamp::parse_timestamp,
};
use formstitch_engine::{Engine, EngineError, SubmissionWrite, catalog::is_reserved_alias};
use formstitch_storage::{RawStore, SqliteStorage, StructuredStore, query::quote_identifier};

/// Parses a `%Y-%m-%d %H:%M:%S` literal.
pub fn at(ts: &str) -> Result<NaiveDateTime, CoreError> {
    parse_timestamp(ts)
}

/// Stores a [`TestSite`] can seed: anything with a SQLite store underneath.
pub trait SiteStore: StructuredStore + RawStore {
    fn sqlite(&self) -> &SqliteStorage;
}

impl SiteStore for SqliteStorage {
    fn sqlite(&self) -> &SqliteStorage {
        self
    }
}

/// An engine over an in-memory store, plus helpers that provision forms and
/// their result tables the way the surrounding application would.
pub struct TestSite<S = SqliteStorage> {
    pub engine: Engine<S>,
}

impl TestSite<SqliteStorage> {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::open_in_memory(config)?,
        })
    }
}

impl<S: SiteStore> TestSite<S> {
    /// Rebuilds the engine over a wrapper of the current store.
    pub fn wrap<W: SiteStore>(self, wrap: impl FnOnce(S) -> W) -> Result<TestSite<W>, EngineError> {
        let config = self.engine.config().clone();
        let store = wrap(self.engine.into_store());
        Ok(TestSite {
            engine: Engine::new(config, store)?,
        })
    }

    fn sqlite(&self) -> &SqliteStorage {
        self.engine.store().sqlite()
    }

    /// Form plus `(label, alias, type)` fields, without a result table.
    pub fn create_form_without_table(
        &self,
        name: &str,
        alias: &str,
        fields: &[(&str, &str, &str)],
    ) -> Result<Form, EngineError> {
        let form = self.sqlite().insert_form(name, alias, None)?;
        for (order, (label, field_alias, field_type)) in fields.iter().enumerate() {
            self.sqlite()
                .insert_field(form.id, label, field_alias, field_type, order as i64)?;
        }
        Ok(form)
    }

    /// Form, fields, and a result table with one column per data field.
    pub fn create_form(
        &self,
        name: &str,
        alias: &str,
        fields: &[(&str, &str, &str)],
    ) -> Result<Form, EngineError> {
        let form = self.create_form_without_table(name, alias, fields)?;
        let mut columns = vec![
            "\"submission_id\" INTEGER PRIMARY KEY".to_string(),
            "\"form_id\" INTEGER NOT NULL".to_string(),
        ];
        for (_, field_alias, field_type) in fields {
            if self.engine.config().is_excluded_type(field_type) || is_reserved_alias(field_alias) {
                continue;
            }
            let affinity = if *field_type == "number" { "NUMERIC" } else { "TEXT" };
            columns.push(format!("{} {affinity}", quote_identifier(field_alias)));
        }
        let table = self.engine.locator().for_form(&form);
        let ddl = format!("CREATE TABLE {} ({})", quote_identifier(&table), columns.join(", "));
        self.engine.store().execute(&ddl, &[])?;
        Ok(form)
    }

    pub fn set_description(&self, form_id: FormId, description: &str) -> Result<(), EngineError> {
        let sql = format!(
            "UPDATE {} SET description = ?1 WHERE id = ?2",
            quote_identifier(self.engine.locator().forms())
        );
        self.engine
            .store()
            .execute(&sql, &[description.into(), form_id.get().into()])?;
        Ok(())
    }

    pub fn add_page(&self, title: &str, alias: &str) -> Result<Page, EngineError> {
        Ok(self.sqlite().insert_page(title, alias)?)
    }

    pub fn add_ip(&self, ip: &str) -> Result<IpAddress, EngineError> {
        Ok(self.sqlite().insert_ip_address(ip)?)
    }

    /// Submits values at `ts` and requires both halves of the write to land.
    pub fn submit(
        &mut self,
        form_id: FormId,
        ts: &str,
        values: &[(&str, FieldValue)],
    ) -> Result<SubmissionId, EngineError> {
        let mut new = NewSubmission::new(form_id, at(ts)?);
        for (alias, value) in values {
            new = new.with_value(alias, value.clone());
        }
        Ok(self.engine.save_submission(&new)?.into_result()?.id)
    }

    pub fn submit_new(&mut self, new: &NewSubmission) -> Result<SubmissionWrite, EngineError> {
        self.engine.save_submission(new)
    }
}

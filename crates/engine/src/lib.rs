pub mod aggregate;
pub mod catalog;
pub mod clauses;
mod columns;
pub mod error;
pub mod locator;
pub mod merge;
pub mod writer;

pub use catalog::FieldCatalog;
pub use error::EngineError;
pub use locator::TableLocator;
pub use writer::SubmissionWrite;

use chrono::{NaiveDateTime, Utc};
use formstitch_core::{
    EngineConfig, FormId, SubmissionId,
    report::{LookbackRequest, RankRequest, RankedForm, SubmissionPoint, SubmissionQueryOptions, TimeSeries, TimeUnit},
    request::{ListRequest, ListResponse},
    submission::{MergedSubmission, NewSubmission},
};
use formstitch_storage::{RawStore, SqliteStorage, StructuredStore};
use tracing::debug;

/// Query engine over one store. Owns the configuration and the table
/// locator derived from it; every read and write goes through here.
pub struct Engine<S = SqliteStorage> {
    config: EngineConfig,
    locator: TableLocator,
    store: S,
}

impl Engine<SqliteStorage> {
    /// In-memory SQLite store with the configured table prefix.
    pub fn open_in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = SqliteStorage::open_in_memory(&config.table_prefix)?;
        Self::new(config, store)
    }

    pub fn open(path: &str, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = SqliteStorage::open(path, &config.table_prefix)?;
        Self::new(config, store)
    }
}

impl<S: StructuredStore + RawStore> Engine<S> {
    pub fn new(config: EngineConfig, store: S) -> Result<Self, EngineError> {
        config.validate()?;
        let locator = TableLocator::from_config(&config);
        debug!(prefix = %config.table_prefix, "engine ready");
        Ok(Self {
            config,
            locator,
            store,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locator(&self) -> &TableLocator {
        &self.locator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Data-bearing fields of a form, in display order.
    pub fn field_catalog(&self, form_id: FormId) -> Result<FieldCatalog, EngineError> {
        catalog::resolve_fields(&self.store, &self.locator, &self.config, form_id)
    }

    pub fn list_submissions(&self, request: &ListRequest) -> Result<ListResponse, EngineError> {
        merge::list_submissions(&self.store, &self.locator, &self.config, request)
    }

    pub fn get_submission(&self, id: SubmissionId) -> Result<MergedSubmission, EngineError> {
        merge::get_submission(&self.store, &self.locator, &self.config, id)
    }

    pub fn save_submission(&mut self, new: &NewSubmission) -> Result<SubmissionWrite, EngineError> {
        writer::save_submission(&mut self.store, &self.locator, &self.config, new)
    }

    pub fn submissions(
        &self,
        options: &SubmissionQueryOptions,
    ) -> Result<Vec<SubmissionPoint>, EngineError> {
        aggregate::fetch_submissions(&self.store, &self.locator, options)
    }

    /// Time series ending with the current UTC period.
    pub fn submissions_since(
        &self,
        form_id: FormId,
        amount: u32,
        unit: TimeUnit,
    ) -> Result<TimeSeries, EngineError> {
        self.submissions_since_at(form_id, amount, unit, Utc::now().naive_utc())
    }

    pub fn submissions_since_at(
        &self,
        form_id: FormId,
        amount: u32,
        unit: TimeUnit,
        now: NaiveDateTime,
    ) -> Result<TimeSeries, EngineError> {
        aggregate::submissions_since(&self.store, &self.locator, form_id, amount, unit, now)
    }

    /// Time series over every submission matching `options`, ending with the
    /// current UTC period.
    pub fn series_since(
        &self,
        options: &SubmissionQueryOptions,
        amount: u32,
        unit: TimeUnit,
    ) -> Result<TimeSeries, EngineError> {
        self.series_since_at(options, amount, unit, Utc::now().naive_utc())
    }

    pub fn series_since_at(
        &self,
        options: &SubmissionQueryOptions,
        amount: u32,
        unit: TimeUnit,
        now: NaiveDateTime,
    ) -> Result<TimeSeries, EngineError> {
        aggregate::series_since(&self.store, &self.locator, options, amount, unit, now)
    }

    pub fn lookback(&self, request: &LookbackRequest) -> Result<TimeSeries, EngineError> {
        self.submissions_since(request.form_id, request.lookback_amount, request.lookback_unit)
    }

    pub fn most_submitted(&self, request: &RankRequest) -> Result<Vec<RankedForm>, EngineError> {
        aggregate::most_submitted(&self.store, &self.locator, request)
    }

    /// Ranked forms as JSON objects, the count keyed by the request's alias or
    /// the configured default.
    pub fn most_submitted_json(
        &self,
        request: &RankRequest,
    ) -> Result<Vec<serde_json::Value>, EngineError> {
        let alias = request
            .count_alias
            .as_deref()
            .unwrap_or(&self.config.rank_count_alias);
        Ok(self
            .most_submitted(request)?
            .iter()
            .map(|r| r.to_json(alias))
            .collect())
    }
}

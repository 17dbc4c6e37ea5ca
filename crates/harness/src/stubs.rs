//! Structured-store wrappers for observing how the engine uses the store.

use std::cell::Cell;

use formstitch_core::{
    FieldValue, FormId, SubmissionId,
    form::Form,
    submission::{NewSubmission, Submission},
};
use formstitch_storage::{RawRow, RawStore, SqliteStorage, StorageError, StructuredStore, SubmissionCriteria};

use crate::site::SiteStore;

macro_rules! delegate_raw_store {
    ($wrapper:ident) => {
        impl<S: RawStore> RawStore for $wrapper<S> {
            fn query(&self, sql: &str, params: &[FieldValue]) -> Result<Vec<RawRow>, StorageError> {
                self.inner.query(sql, params)
            }

            fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<usize, StorageError> {
                self.inner.execute(sql, params)
            }

            fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>, StorageError> {
                self.inner.table_columns(table)
            }
        }

        impl<S: SiteStore> SiteStore for $wrapper<S> {
            fn sqlite(&self) -> &SqliteStorage {
                self.inner.sqlite()
            }
        }
    };
}

/// Returns every batch of headers in reverse of the inner store's order.
pub struct ReversingStore<S = SqliteStorage> {
    inner: S,
}

impl<S> ReversingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

delegate_raw_store!(ReversingStore);

impl<S: StructuredStore> StructuredStore for ReversingStore<S> {
    fn find_form(&self, form_id: FormId) -> Result<Option<Form>, StorageError> {
        self.inner.find_form(form_id)
    }

    fn save_submission(&mut self, submission: &NewSubmission) -> Result<Submission, StorageError> {
        self.inner.save_submission(submission)
    }

    fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StorageError> {
        self.inner.find_submission(id)
    }

    fn query_submissions(
        &self,
        criteria: &SubmissionCriteria,
    ) -> Result<Vec<Submission>, StorageError> {
        let mut rows = self.inner.query_submissions(criteria)?;
        rows.reverse();
        Ok(rows)
    }
}

/// Counts header batch queries.
pub struct CountingStore<S = SqliteStorage> {
    inner: S,
    batches: Cell<usize>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            batches: Cell::new(0),
        }
    }

    pub fn batches(&self) -> usize {
        self.batches.get()
    }
}

delegate_raw_store!(CountingStore);

impl<S: StructuredStore> StructuredStore for CountingStore<S> {
    fn find_form(&self, form_id: FormId) -> Result<Option<Form>, StorageError> {
        self.inner.find_form(form_id)
    }

    fn save_submission(&mut self, submission: &NewSubmission) -> Result<Submission, StorageError> {
        self.inner.save_submission(submission)
    }

    fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StorageError> {
        self.inner.find_submission(id)
    }

    fn query_submissions(
        &self,
        criteria: &SubmissionCriteria,
    ) -> Result<Vec<Submission>, StorageError> {
        self.batches.set(self.batches.get() + 1);
        self.inner.query_submissions(criteria)
    }
}

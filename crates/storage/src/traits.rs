use formstitch_core::{
    field_value::FieldValue,
    form::Form,
    ids::*,
    request::Direction,
    submission::{NewSubmission, Submission},
};

use crate::error::StorageError;
use crate::query::QueryBuilder;

/// One result row, columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: Vec<(String, FieldValue)>,
}

impl RawRow {
    pub fn new(columns: Vec<(String, FieldValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.columns.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Removes a column from the row and returns its value.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        let pos = self.columns.iter().position(|(k, _)| k == name)?;
        Some(self.columns.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_columns(self) -> Vec<(String, FieldValue)> {
        self.columns
    }
}

/// Direct relational access for tables whose names are only known at runtime.
pub trait RawStore {
    fn query(&self, sql: &str, params: &[FieldValue]) -> Result<Vec<RawRow>, StorageError>;

    fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<usize, StorageError>;

    /// Physical columns of `table`, or `None` when the table does not exist.
    fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>, StorageError>;

    fn fetch(&self, query: &QueryBuilder) -> Result<Vec<RawRow>, StorageError> {
        self.query(&query.to_sql(), query.params())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderColumn {
    Id,
    FormId,
    DateSubmitted,
}

impl HeaderColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Id => "s.id",
            Self::FormId => "s.form_id",
            Self::DateSubmitted => "s.date_submitted",
        }
    }
}

/// Selection for [`StructuredStore::query_submissions`]. Without an `order`
/// the store makes no promise about row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionCriteria {
    pub ids: Option<Vec<SubmissionId>>,
    pub form_id: Option<FormId>,
    pub fetch_page: bool,
    pub fetch_ip_address: bool,
    pub order: Vec<(HeaderColumn, Direction)>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl SubmissionCriteria {
    pub fn by_ids(ids: Vec<SubmissionId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    pub fn for_form(form_id: FormId) -> Self {
        Self {
            form_id: Some(form_id),
            ..Self::default()
        }
    }

    /// Join-fetch the page and ip address relations.
    pub fn with_relations(mut self) -> Self {
        self.fetch_page = true;
        self.fetch_ip_address = true;
        self
    }

    pub fn order_by(mut self, column: HeaderColumn, direction: Direction) -> Self {
        self.order.push((column, direction));
        self
    }

    pub fn paginate(mut self, limit: Option<u32>, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Object-mapping layer over the fixed-schema tables.
pub trait StructuredStore {
    fn find_form(&self, form_id: FormId) -> Result<Option<Form>, StorageError>;

    /// Persists the header row only; assigns the id.
    fn save_submission(&mut self, submission: &NewSubmission) -> Result<Submission, StorageError>;

    fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StorageError>;

    fn query_submissions(
        &self,
        criteria: &SubmissionCriteria,
    ) -> Result<Vec<Submission>, StorageError>;
}

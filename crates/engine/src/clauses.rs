//! Translation of generic filter/order/limit requests into SQL clauses.
//!
//! [`ClauseBuilder`] carries the default translation; implementors override
//! [`ClauseBuilder::filter_expr`] to special-case individual filters and
//! [`ClauseBuilder::default_order`] to pick the fallback ordering.

use std::collections::BTreeMap;

use formstitch_core::{
    FieldValue,
    request::{Direction, Filter, FilterOperator, FilterValue, OrderBy},
    timestamp::{DATE_FORMAT, parse_date},
};
use formstitch_storage::{CompareOp, Expr, QueryBuilder, query::qualified};

use crate::catalog::FieldCatalog;
use crate::error::EngineError;

pub const DATE_SUBMITTED: &str = "s.date_submitted";

/// Request-facing column names mapped to the SQL that addresses them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: BTreeMap<String, String>,
}

impl ColumnSet {
    /// Header, ip and result-table columns reachable from the joined results query.
    pub fn for_results(catalog: &FieldCatalog) -> Self {
        let mut set = Self::default();
        for column in [
            "s.id",
            "s.form_id",
            DATE_SUBMITTED,
            "s.referer",
            "s.page_id",
            "s.ip_id",
            "i.ip_address",
        ] {
            set.insert(column, column.to_string());
        }
        set.insert("r.submission_id", "r.submission_id".to_string());
        for alias in catalog.aliases() {
            set.insert(&format!("r.{alias}"), qualified("r", alias));
        }
        set
    }

    pub fn insert(&mut self, name: &str, sql: String) {
        self.columns.insert(name.to_string(), sql);
    }

    pub fn resolve(&self, name: &str) -> Result<&str, EngineError> {
        self.columns
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| EngineError::Validation(format!("unknown column: {name}")))
    }
}

fn scalar<'a>(filter: &'a Filter) -> Result<&'a FieldValue, EngineError> {
    match &filter.value {
        FilterValue::Scalar(v) => Ok(v),
        FilterValue::List(_) => Err(EngineError::Validation(format!(
            "operator {:?} on {} takes a single value",
            filter.operator, filter.column
        ))),
    }
}

fn list(filter: &Filter) -> Result<Vec<FieldValue>, EngineError> {
    match &filter.value {
        FilterValue::List(values) => Ok(values.clone()),
        FilterValue::Scalar(FieldValue::Null) => Err(EngineError::Validation(format!(
            "operator {:?} on {} takes a list",
            filter.operator, filter.column
        ))),
        FilterValue::Scalar(v) => Ok(vec![v.clone()]),
    }
}

/// Default translation of one filter. `DateEq` has no generic meaning and is rejected.
pub fn base_filter_expr(
    columns: &ColumnSet,
    q: &mut QueryBuilder,
    filter: &Filter,
) -> Result<Expr, EngineError> {
    let column = columns.resolve(&filter.column)?;
    let op = match filter.operator {
        FilterOperator::Eq => CompareOp::Eq,
        FilterOperator::Neq => CompareOp::Neq,
        FilterOperator::Lt => CompareOp::Lt,
        FilterOperator::Lte => CompareOp::Lte,
        FilterOperator::Gt => CompareOp::Gt,
        FilterOperator::Gte => CompareOp::Gte,
        FilterOperator::Like => CompareOp::Like,
        FilterOperator::NotLike => CompareOp::NotLike,
        FilterOperator::In => {
            let values = list(filter)?;
            return Ok(q.in_list(column, values));
        }
        FilterOperator::NotIn => {
            let values = list(filter)?;
            return Ok(q.not_in_list(column, values));
        }
        FilterOperator::IsNull => return Ok(Expr::is_null(column)),
        FilterOperator::IsNotNull => return Ok(Expr::is_not_null(column)),
        FilterOperator::DateEq => {
            return Err(EngineError::Validation(format!(
                "date equals is not supported on {}",
                filter.column
            )));
        }
    };
    let value = scalar(filter)?;
    if value.is_null() {
        return Err(EngineError::Validation(format!(
            "operator {:?} on {} needs a value",
            filter.operator, filter.column
        )));
    }
    Ok(q.compare(column, op, value.clone()))
}

pub trait ClauseBuilder {
    fn columns(&self) -> &ColumnSet;

    /// Ordering applied when the request carries none.
    fn default_order(&self) -> Vec<OrderBy> {
        Vec::new()
    }

    /// Override point for per-filter translation.
    fn filter_expr(&self, q: &mut QueryBuilder, filter: &Filter) -> Result<Expr, EngineError> {
        base_filter_expr(self.columns(), q, filter)
    }

    fn build_where(&self, q: &mut QueryBuilder, filters: &[Filter]) -> Result<(), EngineError> {
        for filter in filters {
            let expr = self.filter_expr(q, filter)?;
            q.and_where(expr);
        }
        Ok(())
    }

    fn build_order_by(&self, q: &mut QueryBuilder, order: &[OrderBy]) -> Result<(), EngineError> {
        let order = if order.is_empty() {
            self.default_order()
        } else {
            order.to_vec()
        };
        for o in &order {
            let column = self.columns().resolve(&o.column)?;
            q.order_by(column, o.direction);
        }
        Ok(())
    }

    fn build_limiter(&self, q: &mut QueryBuilder, limit: Option<u32>, offset: u32) {
        q.set_max_results(limit).set_first_result(offset);
    }
}

/// Clauses for the joined submission/result query.
pub struct SubmissionClauses {
    columns: ColumnSet,
}

impl SubmissionClauses {
    pub fn new(columns: ColumnSet) -> Self {
        Self { columns }
    }

    /// Stored timestamps carry a time of day, so a date match becomes an
    /// inclusive range over that whole day.
    fn date_range(&self, q: &mut QueryBuilder, filter: &Filter) -> Result<Expr, EngineError> {
        let raw = match scalar(filter)? {
            FieldValue::Text(s) => s.as_str(),
            other => {
                return Err(EngineError::Validation(format!(
                    "date filter needs a YYYY-MM-DD string, got {other:?}"
                )));
            }
        };
        let date = parse_date(raw)
            .map_err(|e| EngineError::Validation(e.to_string()))?
            .format(DATE_FORMAT)
            .to_string();
        let lower = q.compare(DATE_SUBMITTED, CompareOp::Gte, format!("{date} 00:00:00"));
        let upper = q.compare(DATE_SUBMITTED, CompareOp::Lte, format!("{date} 23:59:59"));
        Ok(Expr::and(vec![lower, upper]))
    }
}

impl ClauseBuilder for SubmissionClauses {
    fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn default_order(&self) -> Vec<OrderBy> {
        vec![OrderBy::new(DATE_SUBMITTED, Direction::Asc)]
    }

    fn filter_expr(&self, q: &mut QueryBuilder, filter: &Filter) -> Result<Expr, EngineError> {
        if filter.column == DATE_SUBMITTED && filter.operator == FilterOperator::DateEq {
            return self.date_range(q, filter);
        }
        base_filter_expr(&self.columns, q, filter)
    }
}

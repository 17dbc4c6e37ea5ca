//! Read path: values and ordering come from the form's result table, headers
//! and relations from the structured store, stitched together by submission id.

use std::collections::HashMap;

use formstitch_core::{
    EngineConfig, FieldValue, FormId, SubmissionId,
    form::Form,
    request::{Direction, ListRequest, ListResponse},
    submission::{MergedSubmission, ResultEntry, Submission, ValueBag},
};
use formstitch_storage::{
    Expr, QueryBuilder, RawRow, RawStore, StructuredStore, SubmissionCriteria,
    query::{qualified, quote_identifier},
};
use tracing::{debug, warn};

use crate::catalog::{FieldCatalog, resolve_fields};
use crate::clauses::{ClauseBuilder, ColumnSet, SubmissionClauses};
use crate::columns::int_column;
use crate::error::EngineError;
use crate::locator::TableLocator;

const SUBMISSION_ID: &str = "submission_id";

/// The count and page queries for one request. Both carry the same joins and
/// filter clauses, so `count` always equals the unpaged row count of `data`.
#[derive(Debug, Clone)]
pub struct ResultQueries {
    pub count: QueryBuilder,
    pub data: QueryBuilder,
}

/// Builds both queries up front; any validation error surfaces before a query runs.
pub fn build_result_queries(
    locator: &TableLocator,
    form: &Form,
    catalog: &FieldCatalog,
    request: &ListRequest,
    default_limit: Option<u32>,
) -> Result<ResultQueries, EngineError> {
    let clauses = SubmissionClauses::new(ColumnSet::for_results(catalog));

    let mut base = QueryBuilder::new();
    base.from(&locator.for_form(form), "r")
        .inner_join(locator.submissions(), "s", "r.submission_id = s.id")
        .left_join(locator.ip_addresses(), "i", "s.ip_id = i.id")
        .and_where(Expr::raw(format!("r.form_id = {}", form.id.get())));
    clauses.build_where(&mut base, &request.filters)?;

    let mut count = base.clone();
    count.select(["COUNT(DISTINCT r.submission_id) AS count"]);

    let mut data = base;
    let mut select = vec![format!("r.submission_id AS {SUBMISSION_ID}")];
    select.extend(
        catalog
            .aliases()
            .map(|alias| format!("{} AS {}", qualified("r", alias), quote_identifier(alias))),
    );
    data.select(select);
    clauses.build_order_by(&mut data, &request.order)?;
    // Total order, so pages never overlap on tied sort keys.
    data.order_by("r.submission_id", Direction::Asc);
    clauses.build_limiter(&mut data, request.limit.or(default_limit), request.offset);

    Ok(ResultQueries { count, data })
}

/// Splits a raw result row into its submission id and value bag. Columns the
/// catalog does not know are dropped.
pub fn build_value_bag(
    mut row: RawRow,
    catalog: &FieldCatalog,
) -> Result<(SubmissionId, ValueBag), EngineError> {
    let id = match row.take(SUBMISSION_ID) {
        Some(FieldValue::Integer(id)) => SubmissionId::new(id),
        other => {
            return Err(EngineError::SchemaMismatch(format!(
                "result row has no usable submission id: {other:?}"
            )));
        }
    };
    Ok((id, pair_with_catalog(row, catalog)))
}

fn pair_with_catalog(row: RawRow, catalog: &FieldCatalog) -> ValueBag {
    let mut bag = ValueBag::new();
    for (column, value) in row.into_columns() {
        if let Some(field) = catalog.get(&column) {
            bag.insert(column, ResultEntry::from_field(field, value));
        }
    }
    bag
}

/// Orders `headers` by each id's position in `order` and attaches its value bag.
/// Headers whose id is not in `order` are dropped.
pub fn stitch(
    order: &[SubmissionId],
    headers: Vec<Submission>,
    mut values: HashMap<SubmissionId, ValueBag>,
) -> Vec<MergedSubmission> {
    let rank: HashMap<SubmissionId, usize> =
        order.iter().enumerate().map(|(pos, id)| (*id, pos)).collect();

    let mut ranked: Vec<(usize, Submission)> = headers
        .into_iter()
        .filter_map(|s| rank.get(&s.id).map(|pos| (*pos, s)))
        .collect();
    ranked.sort_by_key(|(pos, _)| *pos);

    ranked
        .into_iter()
        .map(|(_, submission)| {
            let results = values.remove(&submission.id).unwrap_or_default();
            MergedSubmission { submission, results }
        })
        .collect()
}

/// Drops catalog fields that have no physical column in `table`.
fn restrict_to_table<S: RawStore + ?Sized>(
    store: &S,
    table: &str,
    catalog: &mut FieldCatalog,
) -> Result<(), EngineError> {
    let Some(columns) = store.table_columns(table)? else {
        warn!(table, "result table is missing");
        return Err(EngineError::SchemaMismatch(format!("no such table: {table}")));
    };
    catalog.retain(|field| {
        let present = columns.iter().any(|c| c == &field.alias);
        if !present {
            warn!(table, column = %field.alias, "field has no result column, skipping");
        }
        present
    });
    Ok(())
}

fn find_form<S: StructuredStore + ?Sized>(
    store: &S,
    form_id: FormId,
) -> Result<Form, EngineError> {
    store
        .find_form(form_id)?
        .ok_or_else(|| EngineError::NotFound(format!("form {form_id}")))
}

pub fn list_submissions<S: StructuredStore + RawStore + ?Sized>(
    store: &S,
    locator: &TableLocator,
    config: &EngineConfig,
    request: &ListRequest,
) -> Result<ListResponse, EngineError> {
    let form = find_form(store, request.form_id)?;
    let mut catalog = resolve_fields(store, locator, config, form.id)?;
    let table = locator.for_form(&form);
    restrict_to_table(store, &table, &mut catalog)?;

    let queries = build_result_queries(locator, &form, &catalog, request, config.default_limit)?;

    let count_sql = queries.count.to_sql();
    debug!(sql = %count_sql, params = queries.count.params().len(), "count query");
    let total = match store.query(&count_sql, queries.count.params())?.first() {
        Some(row) => int_column(row, "count")? as u64,
        None => 0,
    };

    let data_sql = queries.data.to_sql();
    debug!(sql = %data_sql, params = queries.data.params().len(), "data query");
    let rows = store.query(&data_sql, queries.data.params())?;

    let mut order = Vec::with_capacity(rows.len());
    let mut values = HashMap::with_capacity(rows.len());
    for row in rows {
        let (id, bag) = build_value_bag(row, &catalog)?;
        if values.insert(id, bag).is_none() {
            order.push(id);
        }
    }

    let results = if order.is_empty() {
        Vec::new()
    } else {
        let criteria = SubmissionCriteria::by_ids(order.clone()).with_relations();
        let headers = store.query_submissions(&criteria)?;
        if headers.len() < order.len() {
            warn!(
                expected = order.len(),
                found = headers.len(),
                "result rows without a submission header"
            );
        }
        stitch(&order, headers, values)
    };

    Ok(if request.with_total_count {
        ListResponse::Counted { count: total, results }
    } else {
        ListResponse::Rows(results)
    })
}

/// One submission with its values. A missing result row or table degrades to
/// an empty value bag.
pub fn get_submission<S: StructuredStore + RawStore + ?Sized>(
    store: &S,
    locator: &TableLocator,
    config: &EngineConfig,
    id: SubmissionId,
) -> Result<MergedSubmission, EngineError> {
    let submission = store
        .find_submission(id)?
        .ok_or_else(|| EngineError::NotFound(format!("submission {id}")))?;
    let form = find_form(store, submission.form_id)?;
    let catalog = resolve_fields(store, locator, config, form.id)?;
    let table = locator.for_form(&form);

    let mut q = QueryBuilder::new();
    q.from(&table, "r");
    let placeholder = q.bind(id.get());
    q.and_where(Expr::raw(format!("r.submission_id = {placeholder}")));

    let results = match store.fetch(&q) {
        Ok(rows) => match rows.into_iter().next() {
            Some(row) => pair_with_catalog(row, &catalog),
            None => {
                warn!(submission_id = %id, table = %table, "submission has no result row");
                ValueBag::new()
            }
        },
        Err(err) if err.is_schema_mismatch() => {
            warn!(submission_id = %id, table = %table, error = %err, "result table unreadable");
            ValueBag::new()
        }
        Err(err) => return Err(err.into()),
    };

    Ok(MergedSubmission { submission, results })
}

//! Reporting reads over the header table: zero-filled time series and
//! per-form submission rankings.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use formstitch_core::{
    FormId, PageId,
    report::{RankRequest, RankedForm, SubmissionPoint, SubmissionQueryOptions, TimeSeries, TimeUnit},
    request::Direction,
    timestamp::{format_timestamp, parse_timestamp},
};
use formstitch_storage::{CompareOp, Expr, QueryBuilder, RawStore, query::escape_like};
use tracing::{debug, warn};

use crate::columns::{int_column, opt_int_column, text_column};
use crate::error::EngineError;
use crate::locator::TableLocator;

/// Longest series a lookback may produce.
pub const MAX_SERIES_SLOTS: u32 = 10_000;

/// Columns that may be counted per form in a ranking.
pub const RANK_COLUMNS: &[&str] = &["fs.id", "fs.ip_id", "fs.page_id", "fs.referer"];

/// Start of the `unit`-sized period containing `ts`. Weeks start on Monday.
pub fn period_start(ts: NaiveDateTime, unit: TimeUnit) -> Option<NaiveDateTime> {
    let date = ts.date();
    let day = match unit {
        TimeUnit::Hour => return date.and_hms_opt(ts.hour(), 0, 0),
        TimeUnit::Day => date,
        TimeUnit::Week => {
            let back = TimeDelta::try_days(i64::from(date.weekday().num_days_from_monday()))?;
            date.checked_sub_signed(back)?
        }
        TimeUnit::Month => date.with_day(1)?,
        TimeUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?,
    };
    day.and_hms_opt(0, 0, 0)
}

/// `ts - n * unit`. Month arithmetic clamps to the end of shorter months.
pub fn step_back(ts: NaiveDateTime, unit: TimeUnit, n: u32) -> Option<NaiveDateTime> {
    let n64 = i64::from(n);
    match unit {
        TimeUnit::Hour => ts.checked_sub_signed(TimeDelta::try_hours(n64)?),
        TimeUnit::Day => ts.checked_sub_signed(TimeDelta::try_days(n64)?),
        TimeUnit::Week => ts.checked_sub_signed(TimeDelta::try_weeks(n64)?),
        TimeUnit::Month => ts.checked_sub_months(Months::new(n)),
        TimeUnit::Year => ts.checked_sub_months(Months::new(n.checked_mul(12)?)),
    }
}

/// `amount` consecutive periods ending with the one containing `now`, plus the
/// query lower bound `now - amount * unit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesWindow {
    pub unit: TimeUnit,
    pub from: NaiveDateTime,
    /// Period starts, oldest first.
    pub slots: Vec<NaiveDateTime>,
}

impl SeriesWindow {
    pub fn new(amount: u32, unit: TimeUnit, now: NaiveDateTime) -> Result<Self, EngineError> {
        if amount == 0 {
            return Err(EngineError::Validation("lookback amount must be positive".into()));
        }
        let out_of_range =
            || EngineError::Validation(format!("lookback of {amount} {unit:?} is out of range"));
        if amount > MAX_SERIES_SLOTS {
            return Err(out_of_range());
        }
        let from = step_back(now, unit, amount).ok_or_else(out_of_range)?;
        let mut slots = Vec::with_capacity(amount as usize);
        for i in (0..amount).rev() {
            let start = step_back(now, unit, i)
                .and_then(|ts| period_start(ts, unit))
                .ok_or_else(out_of_range)?;
            slots.push(start);
        }
        Ok(Self { unit, from, slots })
    }

    pub fn labels(&self) -> Vec<String> {
        let format = self.unit.label_format();
        self.slots.iter().map(|s| s.format(format).to_string()).collect()
    }

    pub fn empty_series(&self) -> TimeSeries {
        TimeSeries {
            labels: self.labels(),
            values: vec![0; self.slots.len()],
        }
    }

    /// Counts timestamps per slot. Timestamps outside every slot are ignored.
    pub fn bucket<'a>(&self, timestamps: impl IntoIterator<Item = &'a NaiveDateTime>) -> TimeSeries {
        let index: HashMap<NaiveDateTime, usize> =
            self.slots.iter().enumerate().map(|(i, s)| (*s, i)).collect();
        let mut series = self.empty_series();
        for ts in timestamps {
            if let Some(slot) = period_start(*ts, self.unit).and_then(|p| index.get(&p)) {
                series.values[*slot] += 1;
            }
        }
        series
    }
}

/// Raw `(form, page, timestamp)` tuples from the header table, oldest first.
pub fn fetch_submissions<S: RawStore + ?Sized>(
    store: &S,
    locator: &TableLocator,
    options: &SubmissionQueryOptions,
) -> Result<Vec<SubmissionPoint>, EngineError> {
    let mut q = QueryBuilder::new();
    q.select([
        "fs.form_id AS form_id",
        "fs.page_id AS page_id",
        "fs.date_submitted AS date_submitted",
    ])
    .from(locator.submissions(), "fs");

    if !options.ip_ids.is_empty() {
        let ids: Vec<i64> = options.ip_ids.iter().map(|id| id.get()).collect();
        q.and_where(Expr::in_ids("fs.ip_id", &ids));
    }
    if let Some(form_id) = options.form_id {
        let e = q.compare("fs.form_id", CompareOp::Eq, form_id.get());
        q.and_where(e);
    }
    if let Some(from) = &options.from_date {
        let e = q.compare("fs.date_submitted", CompareOp::Gte, format_timestamp(from));
        q.and_where(e);
    }
    if let Some(search) = options.search.as_deref().filter(|s| !s.trim().is_empty()) {
        q.left_join(locator.forms(), "f", "f.id = fs.form_id");
        let pattern = format!("%{}%", escape_like(search));
        let name = q.compare("f.name", CompareOp::Like, pattern.clone());
        let description = q.compare("f.description", CompareOp::Like, pattern);
        q.and_where(Expr::or(vec![name, description]));
    }
    q.order_by("fs.date_submitted", Direction::Asc)
        .order_by("fs.id", Direction::Asc);

    debug!(sql = %q.to_sql(), params = q.params().len(), "submission listing");
    let rows = store.fetch(&q)?;
    let mut points = Vec::with_capacity(rows.len());
    for row in &rows {
        points.push(SubmissionPoint {
            form_id: FormId::new(int_column(row, "form_id")?),
            page_id: opt_int_column(row, "page_id")?.map(PageId::new),
            date_submitted: parse_timestamp(&text_column(row, "date_submitted")?)?,
        });
    }
    Ok(points)
}

/// Per-slot counts of the submissions matching `options`. The window's lower
/// bound replaces any `from_date` in `options`. A missing table yields zeros.
pub fn series_since<S: RawStore + ?Sized>(
    store: &S,
    locator: &TableLocator,
    options: &SubmissionQueryOptions,
    amount: u32,
    unit: TimeUnit,
    now: NaiveDateTime,
) -> Result<TimeSeries, EngineError> {
    let window = SeriesWindow::new(amount, unit, now)?;
    let options = SubmissionQueryOptions {
        from_date: Some(window.from),
        ..options.clone()
    };
    match fetch_submissions(store, locator, &options) {
        Ok(points) => Ok(window.bucket(points.iter().map(|p| &p.date_submitted))),
        Err(EngineError::SchemaMismatch(msg)) => {
            warn!(form_id = ?options.form_id, error = %msg, "submission table unreadable, reporting zeros");
            Ok(window.empty_series())
        }
        Err(err) => Err(err),
    }
}

/// [`series_since`] for a single form.
pub fn submissions_since<S: RawStore + ?Sized>(
    store: &S,
    locator: &TableLocator,
    form_id: FormId,
    amount: u32,
    unit: TimeUnit,
    now: NaiveDateTime,
) -> Result<TimeSeries, EngineError> {
    let options = SubmissionQueryOptions {
        form_id: Some(form_id),
        ..SubmissionQueryOptions::default()
    };
    series_since(store, locator, &options, amount, unit, now)
}

/// Forms ranked by how many values of `group_column` their submissions carry.
/// Ties are broken by ascending form id.
pub fn most_submitted<S: RawStore + ?Sized>(
    store: &S,
    locator: &TableLocator,
    request: &RankRequest,
) -> Result<Vec<RankedForm>, EngineError> {
    let column = RANK_COLUMNS
        .iter()
        .find(|c| **c == request.group_column)
        .ok_or_else(|| {
            EngineError::Validation(format!("cannot rank by column {}", request.group_column))
        })?;

    let mut q = QueryBuilder::new();
    q.select([
        "fs.form_id AS id".to_string(),
        "COALESCE(f.name, '') AS title".to_string(),
        format!("COUNT({column}) AS rank_count"),
    ])
    .from(locator.submissions(), "fs")
    .left_join(locator.forms(), "f", "f.id = fs.form_id")
    .group_by("fs.form_id")
    .order_by("rank_count", Direction::Desc)
    .order_by("fs.form_id", Direction::Asc)
    .set_max_results(Some(request.limit))
    .set_first_result(request.offset);

    debug!(sql = %q.to_sql(), "most submitted");
    let rows = store.fetch(&q)?;
    let mut ranked = Vec::with_capacity(rows.len());
    for row in &rows {
        ranked.push(RankedForm {
            title: text_column(row, "title")?,
            id: FormId::new(int_column(row, "id")?),
            count: int_column(row, "rank_count")? as u64,
        });
    }
    Ok(ranked)
}

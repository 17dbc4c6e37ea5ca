use formstitch_core::{
    EngineConfig, FieldValue,
    submission::{NewSubmission, Submission},
};
use formstitch_storage::{RawStore, StructuredStore, query::quote_identifier};
use tracing::{debug, warn};

use crate::catalog::resolve_fields;
use crate::error::EngineError;
use crate::locator::TableLocator;

/// Outcome of a submission write. The header and the value row live in
/// different stores and no transaction spans both, so a write can stop halfway.
#[derive(Debug)]
pub enum SubmissionWrite {
    /// Header and values are both stored.
    Committed(Submission),
    /// The header is stored; the value row is not. `error` is always
    /// [`EngineError::WriteError`].
    HeaderOnly {
        submission: Submission,
        error: EngineError,
    },
}

impl SubmissionWrite {
    pub fn submission(&self) -> &Submission {
        match self {
            Self::Committed(s) => s,
            Self::HeaderOnly { submission, .. } => submission,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// Collapses a partial write into its [`EngineError::WriteError`].
    pub fn into_result(self) -> Result<Submission, EngineError> {
        match self {
            Self::Committed(s) => Ok(s),
            Self::HeaderOnly { error, .. } => Err(error),
        }
    }
}

/// Renders the value-row insert: `submission_id`, `form_id`, then every bag entry.
pub fn build_insert(
    table: &str,
    submission: &Submission,
    new: &NewSubmission,
) -> (String, Vec<FieldValue>) {
    let mut columns = vec![quote_identifier("submission_id"), quote_identifier("form_id")];
    let mut params = vec![
        FieldValue::Integer(submission.id.get()),
        FieldValue::Integer(submission.form_id.get()),
    ];
    for (alias, value) in &new.results {
        columns.push(quote_identifier(alias));
        params.push(value.clone());
    }
    let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns.join(", "),
        placeholders.join(", ")
    );
    (sql, params)
}

/// Saves the header through the structured store, then the value row into the
/// form's result table. Bag keys must all be catalog aliases; that is checked
/// before anything is written.
pub fn save_submission<S: StructuredStore + RawStore + ?Sized>(
    store: &mut S,
    locator: &TableLocator,
    config: &EngineConfig,
    new: &NewSubmission,
) -> Result<SubmissionWrite, EngineError> {
    let form = store
        .find_form(new.form_id)?
        .ok_or_else(|| EngineError::NotFound(format!("form {}", new.form_id)))?;
    let catalog = resolve_fields(&*store, locator, config, form.id)?;
    if let Some(unknown) = new.results.keys().find(|alias| !catalog.contains(alias)) {
        return Err(EngineError::Validation(format!(
            "form {} has no data field {unknown:?}",
            form.id
        )));
    }

    let submission = store.save_submission(new)?;
    if new.results.is_empty() {
        return Ok(SubmissionWrite::Committed(submission));
    }

    let table = locator.for_form(&form);
    let (sql, params) = build_insert(&table, &submission, new);
    debug!(sql = %sql, params = params.len(), "insert result row");
    match store.execute(&sql, &params) {
        Ok(_) => Ok(SubmissionWrite::Committed(submission)),
        Err(err) => {
            warn!(
                submission_id = %submission.id,
                table = %table,
                error = %err,
                "submission header saved without its values"
            );
            let error = EngineError::WriteError {
                submission_id: submission.id,
                reason: err.to_string(),
            };
            Ok(SubmissionWrite::HeaderOnly { submission, error })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use formstitch_core::{FormId, SubmissionId};

    #[test]
    fn insert_binds_every_value() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let new = NewSubmission::new(FormId::new(4), ts)
            .with_value("size", "M")
            .with_value("color", "red");
        let saved = Submission {
            id: SubmissionId::new(17),
            form_id: FormId::new(4),
            date_submitted: ts,
            referer: None,
            ip_address: None,
            page: None,
        };
        let (sql, params) = build_insert("form_results_4_shirt", &saved, &new);
        assert_eq!(
            sql,
            "INSERT INTO \"form_results_4_shirt\" (\"submission_id\", \"form_id\", \"color\", \"size\") \
             VALUES (?1, ?2, ?3, ?4)"
        );
        assert_eq!(
            params,
            vec![
                FieldValue::Integer(17),
                FieldValue::Integer(4),
                FieldValue::from("red"),
                FieldValue::from("M"),
            ]
        );
    }
}

use formstitch_core::{
    EngineConfig, FieldValue, FormId,
    report::SubmissionQueryOptions,
    request::ListRequest,
    submission::NewSubmission,
};
use formstitch_engine::{Engine, EngineError, SubmissionWrite};
use formstitch_harness::{TestSite, at, init_tracing};

const FIELDS: &[(&str, &str, &str)] = &[
    ("Name", "name", "text"),
    ("Age", "age", "number"),
    ("Intro", "intro", "freetext"),
];

fn header_count(site: &TestSite, form_id: FormId) -> Result<usize, EngineError> {
    let options = SubmissionQueryOptions {
        form_id: Some(form_id),
        ..SubmissionQueryOptions::default()
    };
    Ok(site.engine.submissions(&options)?.len())
}

#[test]
fn committed_write_reads_back() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut site = TestSite::new()?;
    let form = site.create_form("Signup", "signup", FIELDS)?;

    let new = NewSubmission::new(form.id, at("2024-05-01 12:30:00")?)
        .with_value("name", "Grace")
        .with_value("age", 85i64);
    let write = site.submit_new(&new)?;
    assert!(write.is_committed());
    let submission = write.into_result()?;
    assert_eq!(submission.form_id, form.id);
    assert_eq!(submission.date_submitted, at("2024-05-01 12:30:00")?);

    let merged = site.engine.get_submission(submission.id)?;
    assert_eq!(merged.results["name"].value, FieldValue::Text("Grace".into()));
    assert_eq!(merged.results["age"].value, FieldValue::Integer(85));
    Ok(())
}

#[test]
fn missing_result_table_leaves_header_only() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut site = TestSite::new()?;
    let form = site.create_form_without_table("Signup", "signup", FIELDS)?;

    let new = NewSubmission::new(form.id, at("2024-05-01 12:30:00")?).with_value("name", "Grace");
    match site.submit_new(&new)? {
        SubmissionWrite::HeaderOnly { submission, error } => {
            match error {
                EngineError::WriteError { submission_id, .. } => {
                    assert_eq!(submission_id, submission.id)
                }
                other => panic!("unexpected error: {other}"),
            }
            // The header stays behind and is still readable.
            let merged = site.engine.get_submission(submission.id)?;
            assert!(merged.results.is_empty());
        }
        SubmissionWrite::Committed(_) => panic!("values cannot land without a table"),
    }
    assert_eq!(header_count(&site, form.id)?, 1);
    Ok(())
}

#[test]
fn header_only_write_surfaces_as_error() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut site = TestSite::new()?;
    let form = site.create_form_without_table("Signup", "signup", FIELDS)?;

    let err = site
        .submit(form.id, "2024-05-01 12:30:00", &[("age", 3i64.into())])
        .unwrap_err();
    assert!(matches!(err, EngineError::WriteError { .. }));
    Ok(())
}

#[test]
fn unknown_or_non_data_aliases_write_nothing() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut site = TestSite::new()?;
    let form = site.create_form("Signup", "signup", FIELDS)?;

    let err = site
        .submit(form.id, "2024-05-01 12:30:00", &[("nickname", "g".into())])
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = site
        .submit(form.id, "2024-05-01 12:30:00", &[("intro", "hello".into())])
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    assert_eq!(header_count(&site, form.id)?, 0);
    Ok(())
}

#[test]
fn unknown_form_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let err = site
        .submit(FormId::new(42), "2024-05-01 12:30:00", &[])
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    Ok(())
}

#[test]
fn empty_bag_commits_without_value_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let form = site.create_form("Signup", "signup", FIELDS)?;
    let id = site.submit(form.id, "2024-05-01 12:30:00", &[])?;

    // No value row, so the joined list has nothing to show.
    let response = site.engine.list_submissions(&ListRequest::new(form.id))?;
    assert!(response.rows().is_empty());
    assert!(site.engine.get_submission(id)?.results.is_empty());
    Ok(())
}

#[test]
fn prefixed_tables_are_used_throughout() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::with_config(EngineConfig::with_prefix("mt_"))?;
    let form = site.create_form("Signup", "signup", FIELDS)?;
    assert_eq!(
        site.engine.locator().for_form(&form),
        format!("mt_form_results_{}_signup", form.id)
    );
    site.submit(form.id, "2024-05-01 12:30:00", &[("name", "Grace".into())])?;

    let response = site.engine.list_submissions(&ListRequest::new(form.id))?;
    assert_eq!(response.rows().len(), 1);
    Ok(())
}

#[test]
fn invalid_prefix_is_rejected() {
    let config = EngineConfig::with_prefix("mt\"; --");
    assert!(matches!(
        TestSite::with_config(config),
        Err(EngineError::Core(_))
    ));
}

#[test]
fn file_backed_store_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("forms.db");
    let path = path.to_str().ok_or("non-utf8 temp path")?;

    let (form_id, id) = {
        let mut site = TestSite {
            engine: Engine::open(path, EngineConfig::default())?,
        };
        let form = site.create_form("Signup", "signup", FIELDS)?;
        let id = site.submit(form.id, "2024-05-01 12:30:00", &[("name", "Grace".into())])?;
        (form.id, id)
    };

    let engine = Engine::open(path, EngineConfig::default())?;
    let response = engine.list_submissions(&ListRequest::new(form_id))?;
    assert_eq!(response.rows().len(), 1);
    assert_eq!(response.rows()[0].submission.id, id);
    assert_eq!(
        response.rows()[0].results["name"].value,
        FieldValue::Text("Grace".into())
    );
    Ok(())
}

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::form::FieldDefinition;
use crate::ids::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    pub id: IpAddressId,
    pub ip_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    pub alias: String,
}

/// Fixed-schema header row. Relations are only populated when join-fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub form_id: FormId,
    pub date_submitted: NaiveDateTime,
    pub referer: Option<String>,
    pub ip_address: Option<IpAddress>,
    pub page: Option<Page>,
}

/// Header plus raw field values, as handed to the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub form_id: FormId,
    pub date_submitted: NaiveDateTime,
    pub referer: Option<String>,
    pub ip_address_id: Option<IpAddressId>,
    pub page_id: Option<PageId>,
    pub results: BTreeMap<String, FieldValue>,
}

impl NewSubmission {
    pub fn new(form_id: FormId, date_submitted: NaiveDateTime) -> Self {
        Self {
            form_id,
            date_submitted,
            referer: None,
            ip_address_id: None,
            page_id: None,
            results: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, alias: &str, value: impl Into<FieldValue>) -> Self {
        self.results.insert(alias.to_string(), value.into());
        self
    }
}

/// One entry of a value bag: the field's metadata plus the stored scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub label: String,
    pub alias: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: FieldValue,
}

impl ResultEntry {
    pub fn from_field(field: &FieldDefinition, value: FieldValue) -> Self {
        Self {
            label: field.label.clone(),
            alias: field.alias.clone(),
            field_type: field.field_type.clone(),
            value,
        }
    }
}

pub type ValueBag = BTreeMap<String, ResultEntry>;

/// Request-scoped view: header attributes with the value bag under `results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSubmission {
    #[serde(flatten)]
    pub submission: Submission,
    pub results: ValueBag,
}

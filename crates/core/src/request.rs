use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::ids::FormId;
use crate::submission::MergedSubmission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    /// Calendar-day match on a timestamp column.
    DateEq,
}

impl FilterOperator {
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    pub fn takes_no_value(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<FieldValue>),
    Scalar(FieldValue),
}

impl Default for FilterValue {
    fn default() -> Self {
        FilterValue::Scalar(FieldValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    #[serde(rename = "expr")]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: &str, operator: FilterOperator, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: FilterValue::Scalar(value.into()),
        }
    }

    pub fn list(column: &str, operator: FilterOperator, values: Vec<FieldValue>) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: FilterValue::List(values),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(column: &str, direction: Direction) -> Self {
        Self {
            column: column.to_string(),
            direction,
        }
    }
}

/// Read-path request: filters, ordering and pagination against one form's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub form_id: FormId,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub with_total_count: bool,
}

impl ListRequest {
    pub fn new(form_id: FormId) -> Self {
        Self {
            form_id,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: 0,
            with_total_count: false,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order.push(OrderBy::new(column, direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_total_count(mut self) -> Self {
        self.with_total_count = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListResponse {
    Rows(Vec<MergedSubmission>),
    Counted {
        count: u64,
        results: Vec<MergedSubmission>,
    },
}

impl ListResponse {
    pub fn rows(&self) -> &[MergedSubmission] {
        match self {
            Self::Rows(rows) => rows,
            Self::Counted { results, .. } => results,
        }
    }

    pub fn total(&self) -> Option<u64> {
        match self {
            Self::Rows(_) => None,
            Self::Counted { count, .. } => Some(*count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generic_request_json() {
        let req: ListRequest = serde_json::from_str(
            r#"{
                "formId": 4,
                "filters": [
                    {"column": "s.date_submitted", "expr": "dateEq", "value": "2024-03-01"},
                    {"column": "r.size", "expr": "in", "value": ["S", "M"]}
                ],
                "order": [{"column": "r.color", "direction": "DESC"}],
                "limit": 10,
                "withTotalCount": true
            }"#,
        )
        .unwrap();
        assert_eq!(req.form_id, FormId::new(4));
        assert_eq!(req.filters[0].operator, FilterOperator::DateEq);
        assert_eq!(
            req.filters[1].value,
            FilterValue::List(vec!["S".into(), "M".into()])
        );
        assert_eq!(req.order[0].direction, Direction::Desc);
        assert_eq!(req.offset, 0);
        assert!(req.with_total_count);
    }

    #[test]
    fn counted_response_wraps_rows() {
        let resp = ListResponse::Counted { count: 3, results: vec![] };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["count"], 3);
        assert!(json["results"].as_array().unwrap().is_empty());
        assert_eq!(resp.total(), Some(3));
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{FormId, IpAddressId, PageId};

/// Granularity of a lookback window. Serialized with the short unit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "H")]
    Hour,
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "Y")]
    Year,
}

impl TimeUnit {
    pub fn parse(code: &str) -> Result<Self, CoreError> {
        match code {
            "H" | "hour" => Ok(Self::Hour),
            "D" | "day" => Ok(Self::Day),
            "W" | "week" => Ok(Self::Week),
            "M" | "month" => Ok(Self::Month),
            "Y" | "year" => Ok(Self::Year),
            _ => Err(CoreError::InvalidData(format!("unknown time unit: {code}"))),
        }
    }

    pub fn label_format(&self) -> &'static str {
        match self {
            Self::Hour => "%H:00",
            Self::Day => "%b %-d, %y",
            Self::Week => "Week %V",
            Self::Month => "%b %Y",
            Self::Year => "%Y",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookbackRequest {
    pub form_id: FormId,
    pub lookback_amount: u32,
    pub lookback_unit: TimeUnit,
}

/// Zero-filled series, oldest slot first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    /// Column counted per form, e.g. `fs.id` or `fs.ip_id`.
    pub group_column: String,
    #[serde(default)]
    pub count_alias: Option<String>,
}

impl RankRequest {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            offset: 0,
            group_column: "fs.id".to_string(),
            count_alias: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedForm {
    pub title: String,
    pub id: FormId,
    pub count: u64,
}

impl RankedForm {
    /// `{title, id, <alias>: count}`.
    pub fn to_json(&self, count_alias: &str) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("title".into(), self.title.clone().into());
        map.insert("id".into(), self.id.get().into());
        map.insert(count_alias.to_string(), self.count.into());
        serde_json::Value::Object(map)
    }
}

/// Filters for the raw submission listing that feeds reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionQueryOptions {
    pub form_id: Option<FormId>,
    pub from_date: Option<NaiveDateTime>,
    pub ip_ids: Vec<IpAddressId>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPoint {
    pub form_id: FormId,
    pub page_id: Option<PageId>,
    pub date_submitted: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_codes() {
        assert_eq!(TimeUnit::parse("D").unwrap(), TimeUnit::Day);
        assert_eq!(TimeUnit::parse("month").unwrap(), TimeUnit::Month);
        assert!(TimeUnit::parse("fortnight").is_err());
        let req: LookbackRequest =
            serde_json::from_str(r#"{"formId":1,"lookbackAmount":7,"lookbackUnit":"D"}"#).unwrap();
        assert_eq!(req.lookback_unit, TimeUnit::Day);
    }

    #[test]
    fn ranked_form_uses_alias_key() {
        let row = RankedForm { title: "Contact".into(), id: FormId::new(2), count: 10 };
        let json = row.to_json("submissions");
        assert_eq!(json["submissions"], 10);
        assert_eq!(json["title"], "Contact");
    }
}

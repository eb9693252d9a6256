//! Data package descriptions as published at a metadata URL.
//!
//! A description names the package and lists its resources; each resource
//! carries a relative `path` to its CSV plus descriptive budget fields.

use crate::common::error::{CatalogError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPackageDescriptor {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub name: Option<String>,
    pub path: Option<String>,
    pub currency: Option<String>,
    pub date_last_updated: Option<String>,
    pub date_published: Option<String>,
    pub fiscal_year: Option<String>,
    pub granularity: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub description: Option<String>,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResourceDescriptor {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Returns the value of a required resource field.
pub fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| CatalogError::MissingField(field.to_string()))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

/// Parses the textual date forms found in resource descriptions into a
/// date-time. Bare dates become midnight; `YYYY-MM` and `YYYY` become the
/// first day of the month/year.
pub fn parse_resource_date(field: &str, value: &str) -> Result<NaiveDateTime> {
    let v = value.trim();
    let err = || CatalogError::DateParse {
        field: field.to_string(),
        value: value.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Ok(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Ok(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(v, fmt) {
            return d.and_hms_opt(0, 0, 0).ok_or_else(err);
        }
    }

    // Partial dates: "2020-03" and "2020"
    let parts: Vec<&str> = v.split('-').collect();
    let date = match parts.as_slice() {
        [y, m] if y.len() == 4 => {
            let year = y.parse().map_err(|_| err())?;
            let month = m.parse().map_err(|_| err())?;
            NaiveDate::from_ymd_opt(year, month, 1)
        }
        [y] if y.len() == 4 => {
            let year = y.parse().map_err(|_| err())?;
            NaiveDate::from_ymd_opt(year, 1, 1)
        }
        _ => None,
    };
    date.and_then(|d| d.and_hms_opt(0, 0, 0)).ok_or_else(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_common_date_forms() {
        assert_eq!(parse_resource_date("d", "2020-01-01").unwrap(), midnight(2020, 1, 1));
        assert_eq!(parse_resource_date("d", "2020-03").unwrap(), midnight(2020, 3, 1));
        assert_eq!(parse_resource_date("d", "2019").unwrap(), midnight(2019, 1, 1));
        assert_eq!(
            parse_resource_date("d", "2020-01-01T12:30:00Z").unwrap(),
            midnight(2020, 1, 1).date().and_hms_opt(12, 30, 0).unwrap()
        );
        assert_eq!(
            parse_resource_date("d", "2020-05-04 08:00:00").unwrap(),
            midnight(2020, 5, 4).date().and_hms_opt(8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_resource_date("fiscalYear", "next tuesday").unwrap_err();
        match err {
            CatalogError::DateParse { field, value } => {
                assert_eq!(field, "fiscalYear");
                assert_eq!(value, "next tuesday");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_resource_date("d", "2020-13").is_err());
    }

    #[test]
    fn test_descriptor_deserializes_camel_case_and_keeps_extras() {
        let descriptor: DataPackageDescriptor = serde_json::from_value(json!({
            "name": "Budget2020",
            "resources": [{
                "name": "Health",
                "path": "health.csv",
                "currency": "USD",
                "dateLastUpdated": "2020-01-01",
                "datePublished": "2020-01-01",
                "fiscalYear": "2020-01-01",
                "granularity": "monthly",
                "status": "final",
                "type": "expenditure",
                "schema": {"fields": []}
            }]
        }))
        .unwrap();

        let r = &descriptor.resources[0];
        assert_eq!(r.date_last_updated.as_deref(), Some("2020-01-01"));
        assert_eq!(r.resource_type.as_deref(), Some("expenditure"));
        assert!(r.extra.contains_key("schema"));
        assert!(required(&r.description, "description").is_err());
    }
}

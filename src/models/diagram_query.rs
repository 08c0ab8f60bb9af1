//! Diagram records request/response models
//!
//! Models for the GET /api/diagrams/{diagram}/records endpoint used by the
//! chart frontend.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::consolidation_type::ConsolidationType;
use crate::models::diagram_record::{DiagramRecord, RecordOrigin};

pub const DEFAULT_PAGE_LIMIT: u64 = 100;
pub const MAX_PAGE_LIMIT: u64 = 5000;

/// Query parameters for the records endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagramRecordsQuery {
    /// 1-based page number (defaults to 1)
    pub page: Option<u64>,
    /// Page size (defaults to 100)
    pub limit: Option<u64>,
    /// Comma-separated consolidation type codes, e.g. `1,2` (defaults to `0`)
    #[serde(rename = "consolidation-type")]
    pub consolidation_type: Option<String>,
    /// Inclusive lower bound, interpreted as UTC
    pub start: Option<String>,
    /// Inclusive upper bound, interpreted as UTC
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordsPage {
    pub page: u64,
    pub limit: u64,
    pub types: Vec<ConsolidationType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl RecordsPage {
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

impl DiagramRecordsQuery {
    pub fn validate(&self) -> Result<RecordsPage, String> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err("Invalid page: must be at least 1".to_string());
        }

        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(format!(
                "Invalid limit: {}. Must be between 1 and {}",
                limit, MAX_PAGE_LIMIT
            ));
        }

        // Postgres OFFSET is a bigint
        (page - 1)
            .checked_mul(limit)
            .filter(|offset| *offset <= i64::MAX as u64)
            .ok_or_else(|| format!("Invalid page: {} is out of range", page))?;

        let types = match self.consolidation_type.as_deref() {
            None | Some("") => vec![ConsolidationType::None],
            Some(list) => parse_consolidation_types(list)?,
        };

        let start = self.start.as_deref().map(parse_utc_datetime).transpose()?;
        let end = self.end.as_deref().map(parse_utc_datetime).transpose()?;

        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(format!("Invalid range: start {} is after end {}", s, e));
            }
        }

        Ok(RecordsPage {
            page,
            limit,
            types,
            start,
            end,
        })
    }
}

/// Query parameters for the latest-records endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestRecordsQuery {
    /// Comma-separated consolidation type codes (defaults to every type)
    #[serde(rename = "consolidation-type")]
    pub consolidation_type: Option<String>,
}

impl LatestRecordsQuery {
    pub fn validate(&self) -> Result<Vec<ConsolidationType>, String> {
        match self.consolidation_type.as_deref() {
            None | Some("") => Ok(ConsolidationType::ALL.to_vec()),
            Some(list) => parse_consolidation_types(list),
        }
    }
}

/// Parse a comma-separated list of integer consolidation type codes
pub fn parse_consolidation_types(list: &str) -> Result<Vec<ConsolidationType>, String> {
    let mut types = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let code: i16 = part
            .parse()
            .map_err(|_| format!("Invalid consolidation type: '{}'", part))?;
        let kind = ConsolidationType::try_from(code)?;
        if !types.contains(&kind) {
            types.push(kind);
        }
    }

    if types.is_empty() {
        return Err("Invalid consolidation type: empty list".to_string());
    }
    Ok(types)
}

/// Parse an ISO-like datetime; values without an offset are UTC
pub fn parse_utc_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid datetime: '{}'", s))
}

/// Single chart point
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRecordEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// UTC measurement time
    pub measurement_time: DateTime<Utc>,
    pub consolidation_type: ConsolidationType,
    pub origin: RecordOrigin,
    pub values: BTreeMap<String, f64>,
}

impl From<DiagramRecord> for DiagramRecordEntry {
    fn from(record: DiagramRecord) -> Self {
        Self {
            id: record.id,
            measurement_time: record.measurement_time,
            consolidation_type: record.consolidation_type,
            origin: record.origin,
            values: record.values,
        }
    }
}

/// Response for the records endpoint, sorted ascending by measurement time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRecordsResponse {
    pub data: Vec<DiagramRecordEntry>,
    pub total_count: u64,
}

/// Response for the latest-records endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestRecordsResponse {
    pub diagram: String,
    pub records: Vec<DiagramRecordEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let page = DiagramRecordsQuery::default().validate().unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(page.types, vec![ConsolidationType::None]);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_offset_from_page() {
        let query = DiagramRecordsQuery {
            page: Some(3),
            limit: Some(50),
            ..Default::default()
        };
        assert_eq!(query.validate().unwrap().offset(), 100);
    }

    #[test]
    fn test_invalid_page_and_limit() {
        let zero_page = DiagramRecordsQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(zero_page.validate().unwrap_err().contains("page"));

        let huge = DiagramRecordsQuery {
            limit: Some(MAX_PAGE_LIMIT + 1),
            ..Default::default()
        };
        assert!(huge.validate().unwrap_err().contains("limit"));
    }

    #[test]
    fn test_huge_page_rejected_instead_of_overflowing() {
        let query = DiagramRecordsQuery {
            page: Some(u64::MAX),
            limit: Some(100),
            ..Default::default()
        };
        assert!(query.validate().unwrap_err().contains("page"));

        let beyond_bigint = DiagramRecordsQuery {
            page: Some(i64::MAX as u64 / 2 + 2),
            limit: Some(2),
            ..Default::default()
        };
        assert!(beyond_bigint.validate().is_err());
    }

    #[test]
    fn test_parse_consolidation_type_list() {
        assert_eq!(
            parse_consolidation_types("1, 2,2").unwrap(),
            vec![ConsolidationType::Minute, ConsolidationType::Hour]
        );
        assert!(parse_consolidation_types("1,9").is_err());
        assert!(parse_consolidation_types("hour").is_err());
        assert!(parse_consolidation_types(" , ").is_err());
    }

    #[test]
    fn test_parse_datetime_formats_as_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(parse_utc_datetime("2024-05-06T07:08:09").unwrap(), expected);
        assert_eq!(parse_utc_datetime("2024-05-06 07:08:09").unwrap(), expected);
        assert_eq!(parse_utc_datetime("2024-05-06T07:08:09Z").unwrap(), expected);
        assert_eq!(parse_utc_datetime("2024-05-06T10:08:09+03:00").unwrap(), expected);
        assert_eq!(
            parse_utc_datetime("2024-05-06").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap()
        );
        assert!(parse_utc_datetime("06/05/2024").is_err());
    }

    #[test]
    fn test_latest_query_defaults_to_every_type() {
        assert_eq!(LatestRecordsQuery::default().validate().unwrap().len(), 5);

        let query = LatestRecordsQuery {
            consolidation_type: Some("3".to_string()),
        };
        assert_eq!(query.validate().unwrap(), vec![ConsolidationType::Day]);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let query = DiagramRecordsQuery {
            start: Some("2024-05-07".to_string()),
            end: Some("2024-05-06".to_string()),
            ..Default::default()
        };
        assert!(query.validate().unwrap_err().contains("range"));
    }
}

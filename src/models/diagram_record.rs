//! Diagram and source record domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::models::consolidation_type::ConsolidationType;

/// Which stage produced a diagram record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrigin {
    Translated,
    Consolidated,
    Interpolated,
}

impl RecordOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOrigin::Translated => "translated",
            RecordOrigin::Consolidated => "consolidated",
            RecordOrigin::Interpolated => "interpolated",
        }
    }
}

impl FromStr for RecordOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "translated" => Ok(RecordOrigin::Translated),
            "consolidated" => Ok(RecordOrigin::Consolidated),
            "interpolated" => Ok(RecordOrigin::Interpolated),
            _ => Err(format!("Invalid record origin: '{}'", s)),
        }
    }
}

/// One point of a diagram time series.
///
/// A value field missing from `values` is null. Records are immutable once
/// stored; `(diagram, measurement_time, consolidation_type)` is unique.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramRecord {
    pub id: Option<i64>,
    pub diagram: String,
    pub measurement_time: DateTime<Utc>,
    pub consolidation_type: ConsolidationType,
    pub origin: RecordOrigin,
    pub values: BTreeMap<String, f64>,
}

impl DiagramRecord {
    pub fn new(
        diagram: impl Into<String>,
        measurement_time: DateTime<Utc>,
        consolidation_type: ConsolidationType,
        origin: RecordOrigin,
    ) -> Self {
        Self {
            id: None,
            diagram: diagram.into(),
            measurement_time,
            consolidation_type,
            origin,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// Store `value`, or clear the field when `None`
    pub fn set_value(&mut self, field: &str, value: Option<f64>) {
        match value {
            Some(v) => {
                self.values.insert(field.to_string(), v);
            }
            None => {
                self.values.remove(field);
            }
        }
    }

    /// Natural key used for idempotent inserts
    pub fn natural_key(&self) -> (String, DateTime<Utc>, ConsolidationType) {
        (
            self.diagram.clone(),
            self.measurement_time,
            self.consolidation_type,
        )
    }

    /// Encode values as a JSON object for storage
    pub fn values_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .filter_map(|(k, v)| {
                    serde_json::Number::from_f64(*v).map(|n| (k.clone(), serde_json::Value::Number(n)))
                })
                .collect(),
        )
    }

    /// Decode a stored JSON object; nulls and non-numbers are dropped
    pub fn values_from_json(json: &serde_json::Value) -> BTreeMap<String, f64> {
        json.as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A raw record ingested from a data source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: i64,
    pub data_source: String,
    pub measurement_time: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_set_value_none_clears_field() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = DiagramRecord::new("boiler", t, ConsolidationType::None, RecordOrigin::Translated)
            .with_value("temperature", 21.5);

        assert_eq!(record.value("temperature"), Some(21.5));
        record.set_value("temperature", None);
        assert_eq!(record.value("temperature"), None);
    }

    #[test]
    fn test_values_from_json_skips_nulls() {
        let values = DiagramRecord::values_from_json(&json!({"a": 1.5, "b": null, "c": "x", "d": 3}));
        assert_eq!(values.len(), 2);
        assert_eq!(values["a"], 1.5);
        assert_eq!(values["d"], 3.0);
    }

    #[test]
    fn test_values_json_drops_non_finite() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = DiagramRecord::new("boiler", t, ConsolidationType::None, RecordOrigin::Translated)
            .with_value("ok", 2.0)
            .with_value("bad", f64::NAN);

        assert_eq!(record.values_json(), json!({"ok": 2.0}));
    }

    #[test]
    fn test_origin_round_trip_names() {
        for origin in [RecordOrigin::Translated, RecordOrigin::Consolidated, RecordOrigin::Interpolated] {
            assert_eq!(origin.as_str().parse::<RecordOrigin>(), Ok(origin));
        }
        assert!("imported".parse::<RecordOrigin>().unwrap_err().contains("imported"));
    }
}

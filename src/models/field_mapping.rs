//! Field mappings from source payloads onto diagram value fields
//!
//! Getter expressions are parsed once into `SourceAccessor` closures when a
//! mapping is resolved, so translating a record never re-parses them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::models::diagram_record::{DiagramRecord, SourceRecord};

/// Stored form of one field mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Dotted path into the source payload, e.g. `sensors.0.temperature`.
    /// `None` means the target field is not fed by this data source.
    #[serde(default)]
    pub source_getter: Option<String>,
    #[serde(default)]
    pub target_field: String,
}

impl FieldMapping {
    pub fn new(source_getter: Option<&str>, target_field: &str) -> Self {
        Self {
            source_getter: source_getter.map(str::to_string),
            target_field: target_field.to_string(),
        }
    }

    fn getter(&self) -> Option<&str> {
        self.source_getter
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    /// Neither a getter nor a target: left over from the admin form
    pub fn is_empty(&self) -> bool {
        self.getter().is_none() && self.target_field.trim().is_empty()
    }
}

type ReadFn = dyn Fn(&Value) -> Option<f64> + Send + Sync;

/// Typed reader for one numeric value of a source payload
#[derive(Clone)]
pub struct SourceAccessor {
    expression: String,
    read: Arc<ReadFn>,
}

impl SourceAccessor {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let segments: Vec<String> = expression.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("Invalid getter expression: '{}'", expression));
        }

        let read = move |payload: &Value| {
            let mut current = payload;
            for segment in &segments {
                current = match current {
                    Value::Object(map) => map.get(segment)?,
                    Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                    _ => return None,
                };
            }
            numeric_value(current)
        };

        Ok(Self {
            expression: expression.trim().to_string(),
            read: Arc::new(read),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn read(&self, record: &SourceRecord) -> Option<f64> {
        (self.read)(&record.payload)
    }
}

impl fmt::Debug for SourceAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceAccessor").field(&self.expression).finish()
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Getter/setter pair for one value field of a diagram record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetField {
    name: String,
}

impl TargetField {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, record: &DiagramRecord) -> Option<f64> {
        record.value(&self.name)
    }

    pub fn set(&self, record: &mut DiagramRecord, value: Option<f64>) {
        record.set_value(&self.name, value);
    }
}

/// A field mapping with its getter resolved
#[derive(Debug, Clone)]
pub struct ResolvedFieldMapping {
    pub source: Option<SourceAccessor>,
    pub target: TargetField,
}

impl ResolvedFieldMapping {
    pub fn resolve(mapping: &FieldMapping) -> Result<Self, String> {
        let target = mapping.target_field.trim();
        if target.is_empty() {
            return Err(format!(
                "Field mapping for getter '{}' has no target field",
                mapping.getter().unwrap_or_default()
            ));
        }

        let source = mapping.getter().map(SourceAccessor::parse).transpose()?;

        Ok(Self {
            source,
            target: TargetField::new(target),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn source(payload: Value) -> SourceRecord {
        SourceRecord {
            id: 1,
            data_source: "weather".to_string(),
            measurement_time: Utc::now(),
            payload,
        }
    }

    #[test]
    fn test_accessor_reads_nested_paths() {
        let record = source(json!({"sensors": [{"temp": 21.5}, {"temp": "19.25"}], "door_open": true}));

        assert_eq!(SourceAccessor::parse("sensors.0.temp").unwrap().read(&record), Some(21.5));
        assert_eq!(SourceAccessor::parse("sensors.1.temp").unwrap().read(&record), Some(19.25));
        assert_eq!(SourceAccessor::parse("door_open").unwrap().read(&record), Some(1.0));
        assert_eq!(SourceAccessor::parse("sensors.5.temp").unwrap().read(&record), None);
        assert_eq!(SourceAccessor::parse("sensors.x").unwrap().read(&record), None);
    }

    #[test]
    fn test_accessor_rejects_empty_segments() {
        assert!(SourceAccessor::parse("a..b").is_err());
        assert!(SourceAccessor::parse("").is_err());
    }

    #[test]
    fn test_non_numeric_values_read_as_none() {
        let record = source(json!({"label": "north", "missing": null}));
        assert_eq!(SourceAccessor::parse("label").unwrap().read(&record), None);
        assert_eq!(SourceAccessor::parse("missing").unwrap().read(&record), None);
    }

    #[test]
    fn test_empty_mapping_detection() {
        assert!(FieldMapping::new(None, "").is_empty());
        assert!(FieldMapping::new(Some("  "), " ").is_empty());
        assert!(!FieldMapping::new(None, "humidity").is_empty());
        assert!(!FieldMapping::new(Some("hum"), "").is_empty());
    }

    #[test]
    fn test_resolve_requires_target() {
        let err = ResolvedFieldMapping::resolve(&FieldMapping::new(Some("hum"), "")).unwrap_err();
        assert!(err.contains("no target field"));

        let resolved = ResolvedFieldMapping::resolve(&FieldMapping::new(None, "humidity")).unwrap();
        assert!(resolved.source.is_none());
        assert_eq!(resolved.target.name(), "humidity");
    }

    #[test]
    fn test_field_mapping_deserializes_with_defaults() {
        let mapping: FieldMapping = serde_json::from_value(json!({"target_field": "pressure"})).unwrap();
        assert_eq!(mapping.source_getter, None);
        assert_eq!(mapping.target_field, "pressure");
    }
}

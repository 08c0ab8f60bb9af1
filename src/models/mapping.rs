//! Data source to diagram mapping aggregate

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ConsolidationError;
use crate::models::field_mapping::{FieldMapping, ResolvedFieldMapping, TargetField};

/// A diagram entity type: a named series with a fixed set of value fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramDefinition {
    pub name: String,
    pub value_fields: Vec<String>,
}

/// Binds a data source to a diagram via an ordered list of field mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceToDiagramMapping {
    pub id: i32,
    pub short_name: String,
    pub data_source: String,
    pub diagram: String,
    pub field_mappings: Vec<FieldMapping>,
}

/// A mapping validated against its diagram, with all accessors resolved
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    pub id: i32,
    pub short_name: String,
    pub data_source: String,
    pub diagram: String,
    pub value_fields: Vec<TargetField>,
    pub field_mappings: Vec<ResolvedFieldMapping>,
}

impl DataSourceToDiagramMapping {
    /// Validate against `definition` and resolve every field mapping.
    ///
    /// Empty entries are dropped; a target that is not a value field of
    /// the diagram, or a field targeted twice, fails the whole mapping.
    pub fn resolve(&self, definition: &DiagramDefinition) -> Result<ResolvedMapping, ConsolidationError> {
        let fail = |reason: String| ConsolidationError::configuration(&self.short_name, reason);

        if definition.name != self.diagram {
            return Err(fail(format!(
                "diagram '{}' does not match definition '{}'",
                self.diagram, definition.name
            )));
        }

        let mut value_fields = Vec::with_capacity(definition.value_fields.len());
        let mut known = HashSet::new();
        for field in &definition.value_fields {
            let field = field.trim();
            if field.is_empty() || !known.insert(field.to_string()) {
                return Err(fail(format!(
                    "diagram '{}' has an empty or duplicate value field '{}'",
                    definition.name, field
                )));
            }
            value_fields.push(TargetField::new(field));
        }

        if value_fields.is_empty() {
            return Err(fail(format!("diagram '{}' has no value fields", definition.name)));
        }

        let mut targeted = HashSet::new();
        let mut field_mappings = Vec::new();
        for mapping in self.field_mappings.iter().filter(|m| !m.is_empty()) {
            let resolved = ResolvedFieldMapping::resolve(mapping).map_err(fail)?;
            let target = resolved.target.name().to_string();

            if !known.contains(&target) {
                return Err(fail(format!(
                    "target field '{}' is not a value field of diagram '{}'",
                    target, definition.name
                )));
            }
            if !targeted.insert(target.clone()) {
                return Err(fail(format!("target field '{}' is mapped more than once", target)));
            }

            field_mappings.push(resolved);
        }

        Ok(ResolvedMapping {
            id: self.id,
            short_name: self.short_name.clone(),
            data_source: self.data_source.clone(),
            diagram: self.diagram.clone(),
            value_fields,
            field_mappings,
        })
    }
}

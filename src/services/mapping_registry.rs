//! Mapping registry
//!
//! Loads data source to diagram mappings with their diagram definitions,
//! validates them and caches the resolved form, so accessors are built once
//! per mapping rather than per record.

use moka::future::Cache;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::entities::{data_source_to_diagram_mappings, diagram_definitions, prelude::*};
use crate::error::{ConsolidationError, StoreError};
use crate::models::field_mapping::FieldMapping;
use crate::models::mapping::{DataSourceToDiagramMapping, DiagramDefinition, ResolvedMapping};

pub struct MappingRegistry {
    db: DatabaseConnection,
    cache: Arc<Cache<i32, Arc<ResolvedMapping>>>,
}

impl MappingRegistry {
    pub fn new(db: DatabaseConnection, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1000).time_to_live(ttl).build();

        Self {
            db,
            cache: Arc::new(cache),
        }
    }

    /// Load and resolve one mapping by id
    pub async fn load(&self, mapping_id: i32) -> Result<Arc<ResolvedMapping>, ConsolidationError> {
        if let Some(cached) = self.cache.get(&mapping_id).await {
            debug!(mapping_id = mapping_id, "Mapping cache hit");
            return Ok(cached);
        }

        let row = DataSourceToDiagramMappings::find_by_id(mapping_id)
            .one(&self.db)
            .await
            .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))?
            .ok_or_else(|| {
                ConsolidationError::configuration(format!("#{}", mapping_id), "mapping does not exist")
            })?;

        self.resolve_row(row).await
    }

    /// Load every enabled mapping.
    ///
    /// A mapping that fails to resolve is logged and left out, so one broken
    /// configuration does not stop the others from running.
    pub async fn load_all(&self) -> Result<Vec<Arc<ResolvedMapping>>, ConsolidationError> {
        let rows = DataSourceToDiagramMappings::find()
            .filter(data_source_to_diagram_mappings::Column::Enabled.eq(true))
            .order_by_asc(data_source_to_diagram_mappings::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))?;

        let total = rows.len();
        let mut resolved = Vec::with_capacity(total);
        for row in rows {
            let short_name = row.short_name.clone();
            match self.resolve_row(row).await {
                Ok(mapping) => resolved.push(mapping),
                Err(e) => warn!(mapping = %short_name, error = %e, "Skipping invalid mapping"),
            }
        }

        info!(loaded = resolved.len(), total = total, "Mappings loaded");
        Ok(resolved)
    }

    pub async fn invalidate(&self, mapping_id: i32) {
        self.cache.invalidate(&mapping_id).await;
    }

    async fn resolve_row(
        &self,
        row: data_source_to_diagram_mappings::Model,
    ) -> Result<Arc<ResolvedMapping>, ConsolidationError> {
        if let Some(cached) = self.cache.get(&row.id).await {
            return Ok(cached);
        }

        let mapping = mapping_from_row(row)?;

        let definition = DiagramDefinitions::find()
            .filter(diagram_definitions::Column::Name.eq(mapping.diagram.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))?
            .ok_or_else(|| {
                ConsolidationError::configuration(
                    &mapping.short_name,
                    format!("diagram '{}' is not defined", mapping.diagram),
                )
            })?;

        let definition = definition_from_row(&mapping.short_name, definition)?;
        let resolved = Arc::new(mapping.resolve(&definition)?);

        let getters: Vec<&str> = resolved
            .field_mappings
            .iter()
            .filter_map(|f| f.source.as_ref().map(|s| s.expression()))
            .collect();
        debug!(mapping = %resolved.short_name, getters = ?getters, "Mapping resolved");

        self.cache.insert(resolved.id, resolved.clone()).await;
        Ok(resolved)
    }
}

fn mapping_from_row(
    row: data_source_to_diagram_mappings::Model,
) -> Result<DataSourceToDiagramMapping, ConsolidationError> {
    let field_mappings: Vec<FieldMapping> = serde_json::from_value(row.field_mappings)
        .map_err(|e| ConsolidationError::configuration(&row.short_name, format!("invalid field mappings: {}", e)))?;

    Ok(DataSourceToDiagramMapping {
        id: row.id,
        short_name: row.short_name,
        data_source: row.data_source,
        diagram: row.diagram,
        field_mappings,
    })
}

fn definition_from_row(
    mapping: &str,
    row: diagram_definitions::Model,
) -> Result<DiagramDefinition, ConsolidationError> {
    let value_fields: Vec<String> = serde_json::from_value(row.value_fields).map_err(|e| {
        ConsolidationError::configuration(mapping, format!("invalid value fields of '{}': {}", row.name, e))
    })?;

    Ok(DiagramDefinition {
        name: row.name,
        value_fields,
    })
}

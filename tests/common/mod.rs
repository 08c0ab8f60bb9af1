use axum::Router;
use diagram_backend::models::field_mapping::FieldMapping;
use diagram_backend::models::mapping::{DataSourceToDiagramMapping, DiagramDefinition, ResolvedMapping};
use diagram_backend::services::record_store_memory::MemoryRecordStore;
use diagram_backend::{build_router, AppState};
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::env;
use std::sync::Arc;

/// Set up test database connection
/// Uses TEST_DATABASE_URL environment variable or falls back to default
#[allow(dead_code)]
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://diagram_user@localhost:5432/diagram_test".to_string());

    Database::connect(&database_url).await
}

/// Router over an in-memory store
#[allow(dead_code)]
pub fn build_test_router(store: Arc<MemoryRecordStore>) -> Router {
    build_router(AppState { store })
}

/// `weather` mapping: `temp` and `wind.speed` into the `weather` diagram
#[allow(dead_code)]
pub fn weather_mapping() -> ResolvedMapping {
    DataSourceToDiagramMapping {
        id: 1,
        short_name: "weather-station".to_string(),
        data_source: "station".to_string(),
        diagram: "weather".to_string(),
        field_mappings: vec![
            FieldMapping::new(Some("temp"), "temperature"),
            FieldMapping::new(Some("wind.speed"), "wind"),
        ],
    }
    .resolve(&DiagramDefinition {
        name: "weather".to_string(),
        value_fields: vec!["temperature".to_string(), "wind".to_string()],
    })
    .expect("weather mapping resolves")
}

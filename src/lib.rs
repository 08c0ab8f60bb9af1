// src/lib.rs

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use services::record_store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

pub mod config;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod services;

/// Build the HTTP router serving diagram data
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route(
            "/api/diagrams/{diagram}/records",
            get(handlers::diagram_records::get_diagram_records),
        )
        .route(
            "/api/diagrams/{diagram}/latest",
            get(handlers::diagram_records::get_latest_records),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "Hello from Diagram Backend!"
}

use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diagram_backend::config::AppConfig;
use diagram_backend::jobs::consolidation_job::start_consolidation_job;
use diagram_backend::services::mapping_registry::MappingRegistry;
use diagram_backend::services::record_store::RecordStore;
use diagram_backend::services::record_store_db::DbRecordStore;
use diagram_backend::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,diagram_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let store: Arc<dyn RecordStore> = Arc::new(DbRecordStore::new(db.clone()));
    store.ensure_provisioned().await?;
    let registry = Arc::new(MappingRegistry::new(db, config.mapping_cache_ttl));

    start_consolidation_job(registry, store.clone(), config.job.clone()).await;

    let app = build_router(AppState { store });

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

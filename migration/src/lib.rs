pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_diagram_definitions;
mod m20261001_000002_create_source_records;
mod m20261001_000003_create_data_source_to_diagram_mappings;
mod m20261001_000004_create_diagram_records;
mod m20261001_000005_create_consolidation_progress;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_diagram_definitions::Migration),
            Box::new(m20261001_000002_create_source_records::Migration),
            Box::new(m20261001_000003_create_data_source_to_diagram_mappings::Migration),
            Box::new(m20261001_000004_create_diagram_records::Migration),
            Box::new(m20261001_000005_create_consolidation_progress::Migration),
        ]
    }
}

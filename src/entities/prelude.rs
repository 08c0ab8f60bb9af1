//! `SeaORM` Entity prelude

pub use super::consolidation_progress::Entity as ConsolidationProgress;
pub use super::data_source_to_diagram_mappings::Entity as DataSourceToDiagramMappings;
pub use super::diagram_definitions::Entity as DiagramDefinitions;
pub use super::diagram_records::Entity as DiagramRecords;
pub use super::source_records::Entity as SourceRecords;

pub mod prelude;

pub mod consolidation_progress;
pub mod data_source_to_diagram_mappings;
pub mod diagram_definitions;
pub mod diagram_records;
pub mod source_records;

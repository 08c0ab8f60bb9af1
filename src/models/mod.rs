pub mod consolidation_type;
pub mod diagram_query;
pub mod diagram_record;
pub mod field_mapping;
pub mod mapping;

pub mod diagram_records;

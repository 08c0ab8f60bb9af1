pub mod consolidation_job;

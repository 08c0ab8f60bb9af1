pub mod consolidation;
pub mod field_translation;
pub mod interpolation;
pub mod mapping_registry;
pub mod record_store;
pub mod record_store_db;
pub mod record_store_memory;

use tokio::time::Instant;

/// True once an optional deadline has been reached
pub fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

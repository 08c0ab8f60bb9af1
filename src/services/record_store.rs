//! Record store interface
//!
//! The engines only talk to storage through `RecordStore`. `DbRecordStore`
//! is the Postgres implementation, `MemoryRecordStore` keeps everything in
//! process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::StoreError;
use crate::models::consolidation_type::ConsolidationType;
use crate::models::diagram_record::{DiagramRecord, SourceRecord};

/// Maximum attempts for a store call failing with a transient error
pub const MAX_RETRIES: u32 = 3;

/// Base delay between retries (ms), doubled per attempt
pub const RETRY_BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Comparison applied to one field
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison<T> {
    Eq(T),
    In(Vec<T>),
    /// Inclusive on both ends
    Between(T, T),
    Lt(T),
    Lte(T),
    Gt(T),
    Gte(T),
}

impl<T: PartialOrd> Comparison<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Comparison::Eq(v) => value == v,
            Comparison::In(vs) => vs.iter().any(|v| value == v),
            Comparison::Between(lo, hi) => lo <= value && value <= hi,
            Comparison::Lt(v) => value < v,
            Comparison::Lte(v) => value <= v,
            Comparison::Gt(v) => value > v,
            Comparison::Gte(v) => value >= v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    MeasurementTime(Comparison<DateTime<Utc>>),
    ConsolidationType(Comparison<ConsolidationType>),
}

impl Condition {
    pub fn matches(&self, record: &DiagramRecord) -> bool {
        match self {
            Condition::MeasurementTime(c) => c.matches(&record.measurement_time),
            Condition::ConsolidationType(c) => c.matches(&record.consolidation_type),
        }
    }
}

/// Records of one diagram matching every condition
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFilter {
    pub diagram: String,
    pub conditions: Vec<Condition>,
}

impl RecordFilter {
    pub fn for_diagram(diagram: impl Into<String>) -> Self {
        Self {
            diagram: diagram.into(),
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn consolidation_type(self, kind: ConsolidationType) -> Self {
        self.with(Condition::ConsolidationType(Comparison::Eq(kind)))
    }

    /// Half-open `[start, end)` on measurement time
    pub fn time_range(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.with(Condition::MeasurementTime(Comparison::Gte(start)))
            .with(Condition::MeasurementTime(Comparison::Lt(end)))
    }

    pub fn matches(&self, record: &DiagramRecord) -> bool {
        record.diagram == self.diagram && self.conditions.iter().all(|c| c.matches(record))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same natural key already exists; nothing written
    Duplicate,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fail with `StoreError::NotProvisioned` if any backing table is missing
    async fn ensure_provisioned(&self) -> Result<(), StoreError>;

    /// Diagram records ordered by `(measurement_time, id)`
    async fn find_records(
        &self,
        filter: &RecordFilter,
        order: SortOrder,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<DiagramRecord>, StoreError>;

    async fn count_records(&self, filter: &RecordFilter) -> Result<u64, StoreError>;

    /// Write all value fields of `record` at once, unless its natural key exists
    async fn insert_record(&self, record: &DiagramRecord) -> Result<InsertOutcome, StoreError>;

    /// Source records with `measurement_time > after`, ascending by `(measurement_time, id)`
    async fn find_source_records(
        &self,
        data_source: &str,
        after: Option<DateTime<Utc>>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<SourceRecord>, StoreError>;

    async fn last_processed(
        &self,
        mapping_id: i32,
        kind: ConsolidationType,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn set_last_processed(
        &self,
        mapping_id: i32,
        kind: ConsolidationType,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Run `op`, retrying transient failures with exponential backoff.
///
/// Any other error is returned on the first attempt.
pub async fn with_retry<T, F, Fut>(operation: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt + 1 < MAX_RETRIES => {
                let delay_ms = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                attempt += 1;
                warn!(
                    operation = operation,
                    attempt = attempt,
                    delay_ms = delay_ms,
                    error = %e,
                    "Transient storage error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::diagram_record::RecordOrigin;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record(minute: u32, kind: ConsolidationType) -> DiagramRecord {
        DiagramRecord::new(
            "boiler",
            Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
            kind,
            RecordOrigin::Translated,
        )
    }

    #[test]
    fn test_comparisons() {
        assert!(Comparison::Eq(3).matches(&3));
        assert!(Comparison::In(vec![1, 2]).matches(&2));
        assert!(!Comparison::In(vec![1, 2]).matches(&5));
        assert!(Comparison::Between(1, 3).matches(&3));
        assert!(Comparison::Between(1, 3).matches(&1));
        assert!(!Comparison::Lt(3).matches(&3));
        assert!(Comparison::Lte(3).matches(&3));
        assert!(Comparison::Gt(3).matches(&4));
        assert!(Comparison::Gte(3).matches(&3));
    }

    #[test]
    fn test_filter_time_range_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap();
        let filter = RecordFilter::for_diagram("boiler")
            .consolidation_type(ConsolidationType::Minute)
            .time_range(start, end);

        assert!(filter.matches(&record(0, ConsolidationType::Minute)));
        assert!(filter.matches(&record(4, ConsolidationType::Minute)));
        assert!(!filter.matches(&record(5, ConsolidationType::Minute)));
        assert!(!filter.matches(&record(1, ConsolidationType::Hour)));

        let mut other = record(1, ConsolidationType::Minute);
        other.diagram = "chimney".to_string();
        assert!(!filter.matches(&other));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry("probe", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Transient("connection reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("probe", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Transient("down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_other_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("probe", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::NotProvisioned("diagram_records".into())) }
        })
        .await;

        assert_eq!(result, Err(StoreError::NotProvisioned("diagram_records".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! In-process record store
//!
//! Same semantics as the database store, including natural-key uniqueness.
//! Used by tests and for local experiments without Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;
use crate::models::consolidation_type::ConsolidationType;
use crate::models::diagram_record::{DiagramRecord, SourceRecord};
use crate::services::record_store::{InsertOutcome, RecordFilter, RecordStore, SortOrder};

type NaturalKey = (String, DateTime<Utc>, ConsolidationType);

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<NaturalKey, DiagramRecord>,
    sources: Vec<SourceRecord>,
    progress: HashMap<(i32, ConsolidationType), DateTime<Utc>>,
    unprovisioned: Option<String>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave as if `table` did not exist
    pub fn unprovisioned(table: &str) -> Self {
        let store = Self::default();
        store.inner.write().unprovisioned = Some(table.to_string());
        store
    }

    pub fn add_source_record(
        &self,
        data_source: &str,
        measurement_time: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> i64 {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.sources.push(SourceRecord {
            id,
            data_source: data_source.to_string(),
            measurement_time,
            payload,
        });
        id
    }

    /// Every stored diagram record, ascending by natural key
    pub fn all_records(&self) -> Vec<DiagramRecord> {
        self.inner.read().records.values().cloned().collect()
    }

    fn check(&self) -> Result<(), StoreError> {
        match &self.inner.read().unprovisioned {
            Some(table) => Err(StoreError::NotProvisioned(table.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn ensure_provisioned(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn find_records(
        &self,
        filter: &RecordFilter,
        order: SortOrder,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<DiagramRecord>, StoreError> {
        self.check()?;
        let inner = self.inner.read();

        let mut matching: Vec<&DiagramRecord> =
            inner.records.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by_key(|r| (r.measurement_time, r.id));
        if order == SortOrder::Desc {
            matching.reverse();
        }

        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_records(&self, filter: &RecordFilter) -> Result<u64, StoreError> {
        self.check()?;
        let inner = self.inner.read();
        Ok(inner.records.values().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn insert_record(&self, record: &DiagramRecord) -> Result<InsertOutcome, StoreError> {
        self.check()?;
        let mut inner = self.inner.write();

        let key = record.natural_key();
        if inner.records.contains_key(&key) {
            return Ok(InsertOutcome::Duplicate);
        }

        inner.next_id += 1;
        let mut stored = record.clone();
        stored.id = Some(inner.next_id);
        inner.records.insert(key, stored);
        Ok(InsertOutcome::Inserted)
    }

    async fn find_source_records(
        &self,
        data_source: &str,
        after: Option<DateTime<Utc>>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        self.check()?;
        let inner = self.inner.read();

        let mut matching: Vec<&SourceRecord> = inner
            .sources
            .iter()
            .filter(|s| s.data_source == data_source)
            .filter(|s| after.is_none_or(|a| s.measurement_time > a))
            .collect();
        matching.sort_by_key(|s| (s.measurement_time, s.id));

        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn last_processed(
        &self,
        mapping_id: i32,
        kind: ConsolidationType,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.check()?;
        Ok(self.inner.read().progress.get(&(mapping_id, kind)).copied())
    }

    async fn set_last_processed(
        &self,
        mapping_id: i32,
        kind: ConsolidationType,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.inner.write().progress.insert((mapping_id, kind), at);
        Ok(())
    }
}

//! Source record translation
//!
//! Projects raw source records 1:1 onto diagram records of granularity
//! `None`, following a resolved mapping.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ConsolidationError;
use crate::models::consolidation_type::ConsolidationType;
use crate::models::diagram_record::{DiagramRecord, RecordOrigin, SourceRecord};
use crate::models::mapping::ResolvedMapping;
use crate::services::deadline_passed;
use crate::services::record_store::{InsertOutcome, RecordStore};

/// Statistics from a translation run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TranslationReport {
    pub read: usize,
    pub inserted: usize,
    pub skipped: usize,
}

pub struct FieldTranslator {
    store: Arc<dyn RecordStore>,
    batch_size: u64,
}

impl FieldTranslator {
    pub fn new(store: Arc<dyn RecordStore>, batch_size: u64) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Build the diagram record for one source record.
    ///
    /// Fields without a source getter, or whose getter finds no numeric
    /// value, stay null.
    pub fn translate(mapping: &ResolvedMapping, source: &SourceRecord) -> DiagramRecord {
        let mut record = DiagramRecord::new(
            mapping.diagram.clone(),
            source.measurement_time,
            ConsolidationType::None,
            RecordOrigin::Translated,
        );

        for field in &mapping.field_mappings {
            if let Some(accessor) = &field.source {
                field.target.set(&mut record, accessor.read(source));
            }
        }

        record
    }

    /// Translate every source record newer than the mapping's translation
    /// progress and advance the progress past the last one read.
    pub async fn translate_pending(
        &self,
        mapping: &ResolvedMapping,
        deadline: Option<Instant>,
    ) -> Result<TranslationReport, ConsolidationError> {
        self.store.ensure_provisioned().await?;

        let after = self
            .store
            .last_processed(mapping.id, ConsolidationType::None)
            .await?;

        let mut report = TranslationReport::default();
        let mut offset = 0;
        let mut last_seen = after;

        loop {
            if deadline_passed(deadline) {
                // Keep what was written; the next run resumes from here
                if let Some(at) = last_seen.filter(|at| Some(*at) != after) {
                    self.store.set_last_processed(mapping.id, ConsolidationType::None, at).await?;
                }
                return Err(ConsolidationError::DeadlineExceeded);
            }

            let batch = self
                .store
                .find_source_records(&mapping.data_source, after, self.batch_size, offset)
                .await?;
            if batch.is_empty() {
                break;
            }

            for source in &batch {
                let record = Self::translate(mapping, source);
                match self.store.insert_record(&record).await? {
                    InsertOutcome::Inserted => report.inserted += 1,
                    InsertOutcome::Duplicate => report.skipped += 1,
                }
                last_seen = Some(source.measurement_time);
            }

            report.read += batch.len();
            offset += batch.len() as u64;
            debug!(mapping = %mapping.short_name, read = report.read, "Translated batch");

            if (batch.len() as u64) < self.batch_size {
                break;
            }
        }

        if let Some(at) = last_seen.filter(|at| Some(*at) != after) {
            self.store.set_last_processed(mapping.id, ConsolidationType::None, at).await?;
        }

        info!(
            mapping = %mapping.short_name,
            read = report.read,
            inserted = report.inserted,
            skipped = report.skipped,
            "Source translation complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field_mapping::FieldMapping;
    use crate::models::mapping::{DataSourceToDiagramMapping, DiagramDefinition};
    use crate::services::record_store_memory::MemoryRecordStore;
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::json;

    fn mapping() -> ResolvedMapping {
        DataSourceToDiagramMapping {
            id: 1,
            short_name: "attic".to_string(),
            data_source: "ruuvi".to_string(),
            diagram: "attic_climate".to_string(),
            field_mappings: vec![
                FieldMapping::new(Some("temperature"), "temperature"),
                FieldMapping::new(Some("env.humidity"), "humidity"),
                FieldMapping::new(None, "pressure"),
            ],
        }
        .resolve(&DiagramDefinition {
            name: "attic_climate".to_string(),
            value_fields: vec!["temperature".into(), "humidity".into(), "pressure".into()],
        })
        .unwrap()
    }

    #[test]
    fn test_translate_reads_getters_and_skips_unmapped() {
        let source = SourceRecord {
            id: 9,
            data_source: "ruuvi".to_string(),
            measurement_time: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 5).unwrap(),
            payload: json!({"temperature": 4.5, "env": {"humidity": "81"}, "pressure": 1013}),
        };

        let record = FieldTranslator::translate(&mapping(), &source);
        assert_eq!(record.diagram, "attic_climate");
        assert_eq!(record.consolidation_type, ConsolidationType::None);
        assert_eq!(record.origin, RecordOrigin::Translated);
        assert_eq!(record.measurement_time, source.measurement_time);
        assert_eq!(record.value("temperature"), Some(4.5));
        assert_eq!(record.value("humidity"), Some(81.0));
        assert_eq!(record.value("pressure"), None);
    }

    #[tokio::test]
    async fn test_translate_pending_is_incremental() {
        let store = Arc::new(MemoryRecordStore::new());
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        for i in 0..5 {
            store.add_source_record("ruuvi", t0 + TimeDelta::seconds(i * 10), json!({"temperature": i}));
        }
        store.add_source_record("elsewhere", t0, json!({"temperature": 99}));

        let translator = FieldTranslator::new(store.clone(), 2);
        let first = translator.translate_pending(&mapping(), None).await.unwrap();
        assert_eq!(first.read, 5);
        assert_eq!(first.inserted, 5);

        let second = translator.translate_pending(&mapping(), None).await.unwrap();
        assert_eq!(second, TranslationReport::default());

        store.add_source_record("ruuvi", t0 + TimeDelta::seconds(60), json!({"temperature": 7}));
        let third = translator.translate_pending(&mapping(), None).await.unwrap();
        assert_eq!(third.inserted, 1);
        assert_eq!(store.all_records().len(), 6);
    }
}

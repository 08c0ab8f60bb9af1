//! Diagram Consolidation Service
//!
//! Downsamples diagram records into coarser time buckets:
//! - records of the next finer granularity are read in time order
//! - each non-empty bucket becomes one record holding the mean of every value field
//! - buckets that already exist are left untouched

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ConsolidationError;
use crate::models::consolidation_type::{ConsolidationType, TimeBucket};
use crate::models::diagram_record::{DiagramRecord, RecordOrigin};
use crate::models::field_mapping::TargetField;
use crate::models::mapping::ResolvedMapping;
use crate::services::deadline_passed;
use crate::services::record_store::{InsertOutcome, RecordFilter, RecordStore, SortOrder};

/// Result of consolidating one mapping into one granularity
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationReport {
    pub target: ConsolidationType,
    pub source: ConsolidationType,
    /// `[start, end)` actually scanned; `None` when there was nothing to do
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub records_read: usize,
    /// Start of every non-empty bucket, whether newly written or already present
    pub buckets: Vec<DateTime<Utc>>,
    pub inserted: usize,
    pub skipped: usize,
}

impl ConsolidationReport {
    fn empty(target: ConsolidationType, source: ConsolidationType) -> Self {
        Self {
            target,
            source,
            range: None,
            records_read: 0,
            buckets: Vec::new(),
            inserted: 0,
            skipped: 0,
        }
    }
}

/// Per-field values of the bucket being filled
struct BucketAccumulator {
    bucket: TimeBucket,
    values: BTreeMap<String, Vec<Option<f64>>>,
}

impl BucketAccumulator {
    fn new(bucket: TimeBucket) -> Self {
        Self {
            bucket,
            values: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &DiagramRecord, fields: &[TargetField]) {
        for field in fields {
            self.values
                .entry(field.name().to_string())
                .or_default()
                .push(field.get(record));
        }
    }

    fn finish(self, mapping: &ResolvedMapping, target: ConsolidationType) -> DiagramRecord {
        let mut record = DiagramRecord::new(
            mapping.diagram.clone(),
            self.bucket.start,
            target,
            RecordOrigin::Consolidated,
        );

        for field in &mapping.value_fields {
            let mean = mean_of_present(self.values.get(field.name()).into_iter().flatten().copied());
            field.set(&mut record, mean);
        }

        record
    }
}

/// Arithmetic mean of the present values; `None` when none are present
pub fn mean_of_present(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / count as f64)
}

pub struct ConsolidationEngine {
    store: Arc<dyn RecordStore>,
    batch_size: u64,
}

impl ConsolidationEngine {
    pub fn new(store: Arc<dyn RecordStore>, batch_size: u64) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Consolidate `mapping`'s diagram into `target` buckets.
    ///
    /// With `range = None` the run continues from the stored progress (or the
    /// first source record) up to the start of the current, incomplete
    /// bucket, and advances the progress. An explicit range is floored to
    /// bucket boundaries on both ends and does not touch the progress.
    pub async fn run(
        &self,
        mapping: &ResolvedMapping,
        target: ConsolidationType,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        deadline: Option<Instant>,
    ) -> Result<ConsolidationReport, ConsolidationError> {
        let source = target
            .source_consolidation_type()
            .ok_or(ConsolidationError::UnsupportedTarget {
                operation: "consolidate",
                target,
            })?;

        self.store.ensure_provisioned().await?;

        let (start, end, track_progress) = match range {
            Some((start, end)) => (
                target.closest_rounded_time(start),
                target.closest_rounded_time(end),
                false,
            ),
            None => match self.default_start(mapping, target, source).await? {
                Some(start) => (start, target.closest_rounded_time(Utc::now()), true),
                None => {
                    debug!(mapping = %mapping.short_name, target = %target, "No source records to consolidate");
                    return Ok(ConsolidationReport::empty(target, source));
                }
            },
        };

        let mut report = ConsolidationReport::empty(target, source);
        if start >= end {
            return Ok(report);
        }
        report.range = Some((start, end));

        let filter = RecordFilter::for_diagram(mapping.diagram.as_str())
            .consolidation_type(source)
            .time_range(start, end);

        let mut current: Option<BucketAccumulator> = None;
        let mut offset = 0;

        loop {
            if deadline_passed(deadline) {
                return Err(ConsolidationError::DeadlineExceeded);
            }

            let batch = self
                .store
                .find_records(&filter, SortOrder::Asc, self.batch_size, offset)
                .await?;
            if batch.is_empty() {
                break;
            }

            for record in &batch {
                let bucket = target.interval_bounds(record.measurement_time);
                let same_bucket = current.as_ref().is_some_and(|acc| acc.bucket == bucket);
                if !same_bucket {
                    if let Some(done) = current.take() {
                        self.write_bucket(mapping, target, done, &mut report).await?;
                    }
                    current = Some(BucketAccumulator::new(bucket));
                }
                if let Some(acc) = current.as_mut() {
                    acc.add(record, &mapping.value_fields);
                }
            }

            report.records_read += batch.len();
            offset += batch.len() as u64;

            if (batch.len() as u64) < self.batch_size {
                break;
            }
        }

        if let Some(done) = current.take() {
            self.write_bucket(mapping, target, done, &mut report).await?;
        }

        if track_progress {
            self.store.set_last_processed(mapping.id, target, end).await?;
        }

        info!(
            mapping = %mapping.short_name,
            source = %source,
            target = %target,
            start = %start,
            end = %end,
            records_read = report.records_read,
            buckets = report.buckets.len(),
            inserted = report.inserted,
            skipped = report.skipped,
            "Consolidation complete"
        );

        Ok(report)
    }

    /// Run every granularity from `Minute` up to `up_to`, finest first, so
    /// each level is built from the one produced just before it.
    pub async fn run_cascade(
        &self,
        mapping: &ResolvedMapping,
        up_to: ConsolidationType,
        deadline: Option<Instant>,
    ) -> Result<Vec<ConsolidationReport>, ConsolidationError> {
        let mut reports = Vec::new();
        for target in up_to.cascade() {
            reports.push(self.run(mapping, target, None, deadline).await?);
        }
        Ok(reports)
    }

    async fn default_start(
        &self,
        mapping: &ResolvedMapping,
        target: ConsolidationType,
        source: ConsolidationType,
    ) -> Result<Option<DateTime<Utc>>, ConsolidationError> {
        if let Some(last) = self.store.last_processed(mapping.id, target).await? {
            return Ok(Some(last));
        }

        let filter = RecordFilter::for_diagram(mapping.diagram.as_str()).consolidation_type(source);
        let first = self.store.find_records(&filter, SortOrder::Asc, 1, 0).await?;

        Ok(first
            .first()
            .map(|r| target.closest_rounded_time(r.measurement_time)))
    }

    async fn write_bucket(
        &self,
        mapping: &ResolvedMapping,
        target: ConsolidationType,
        acc: BucketAccumulator,
        report: &mut ConsolidationReport,
    ) -> Result<(), ConsolidationError> {
        let record = acc.finish(mapping, target);
        report.buckets.push(record.measurement_time);

        match self.store.insert_record(&record).await? {
            InsertOutcome::Inserted => report.inserted += 1,
            InsertOutcome::Duplicate => report.skipped += 1,
        }
        Ok(())
    }
}

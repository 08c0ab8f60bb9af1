//! Diagram Interpolation Service
//!
//! Fills gaps in a diagram series: when two adjacent records of one
//! granularity are more than one bucket apart, a record is synthesized at
//! each missing bucket start by linear interpolation between them.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ArithmeticError, ConsolidationError};
use crate::models::consolidation_type::ConsolidationType;
use crate::models::diagram_record::{DiagramRecord, RecordOrigin};
use crate::models::mapping::ResolvedMapping;
use crate::services::deadline_passed;
use crate::services::record_store::{Comparison, Condition, InsertOutcome, RecordFilter, RecordStore, SortOrder};

/// Statistics from one upsampling call
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpsampleReport {
    /// Adjacent pairs further apart than one bucket
    pub gaps_found: usize,
    pub inserted: usize,
    pub skipped: usize,
    /// Points that could not be computed and were left out
    pub failed: usize,
    /// Stopped early because `limit` records were written
    pub limit_reached: bool,
}

/// Two-point linear interpolation of `y` at `x`
pub fn linear_interpolate(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<f64, ArithmeticError> {
    if x0 == x1 {
        return Err(ArithmeticError::ZeroInterval(x0));
    }

    let rise = y1 - y0;
    let y = if rise.is_finite() {
        y0 + (x - x0) * rise / (x1 - x0)
    } else {
        // Endpoints far apart: blend so the difference cannot overflow
        let t = (x - x0) / (x1 - x0);
        y0 * (1.0 - t) + y1 * t
    };
    if !y.is_finite() {
        return Err(ArithmeticError::NonFinite);
    }
    Ok(y)
}

fn time_axis(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64
}

/// Synthesize the record at `target_time` from its neighbours.
///
/// Only fields present on both `before` and `after` are interpolated; the
/// others stay null. A field whose value cannot be computed is logged and
/// left null as well.
pub fn generate_record_with_interpolation(
    mapping: &ResolvedMapping,
    target_time: DateTime<Utc>,
    target_type: ConsolidationType,
    before: &DiagramRecord,
    after: &DiagramRecord,
) -> Result<DiagramRecord, ArithmeticError> {
    let x0 = time_axis(before.measurement_time);
    let x1 = time_axis(after.measurement_time);
    if x0 == x1 {
        return Err(ArithmeticError::ZeroInterval(x0));
    }

    let x = time_axis(target_time);
    let mut record = DiagramRecord::new(
        mapping.diagram.clone(),
        target_time,
        target_type,
        RecordOrigin::Interpolated,
    );

    for field in &mapping.value_fields {
        let value = match (field.get(before), field.get(after)) {
            (Some(y0), Some(y1)) => match linear_interpolate(x, x0, y0, x1, y1) {
                Ok(y) => Some(y),
                Err(e) => {
                    warn!(
                        diagram = %mapping.diagram,
                        field = %field.name(),
                        time = %target_time,
                        error = %e,
                        "Interpolated value not representable, leaving field null"
                    );
                    None
                }
            },
            _ => None,
        };
        field.set(&mut record, value);
    }

    Ok(record)
}

pub struct InterpolationEngine {
    store: Arc<dyn RecordStore>,
    batch_size: u64,
}

impl InterpolationEngine {
    pub fn new(store: Arc<dyn RecordStore>, batch_size: u64) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Fill missing `target_type` buckets between existing records, writing
    /// at most `limit` new records.
    pub async fn upsample_by_consolidation_type(
        &self,
        mapping: &ResolvedMapping,
        target_type: ConsolidationType,
        limit: usize,
        deadline: Option<Instant>,
    ) -> Result<UpsampleReport, ConsolidationError> {
        if target_type == ConsolidationType::None {
            return Err(ConsolidationError::UnsupportedTarget {
                operation: "upsample",
                target: target_type,
            });
        }

        self.store.ensure_provisioned().await?;

        let mut report = UpsampleReport::default();
        if limit == 0 {
            return Ok(report);
        }

        let base_filter = RecordFilter::for_diagram(mapping.diagram.as_str()).consolidation_type(target_type);
        let mut previous: Option<DiagramRecord> = None;

        // Keyset paging on measurement time: records written below do not
        // shift the pages still to be read.
        'scan: loop {
            if deadline_passed(deadline) {
                return Err(ConsolidationError::DeadlineExceeded);
            }

            let filter = match &previous {
                Some(p) => base_filter
                    .clone()
                    .with(Condition::MeasurementTime(Comparison::Gt(p.measurement_time))),
                None => base_filter.clone(),
            };

            let batch = self
                .store
                .find_records(&filter, SortOrder::Asc, self.batch_size, 0)
                .await?;
            let batch_len = batch.len() as u64;

            for record in batch {
                if let Some(before) = &previous {
                    let expected = target_type.next_bucket_start(before.measurement_time);
                    if expected < record.measurement_time {
                        report.gaps_found += 1;
                        self.fill_gap(mapping, target_type, before, &record, limit, &mut report)
                            .await?;
                        if report.limit_reached {
                            break 'scan;
                        }
                    }
                }
                previous = Some(record);
            }

            if batch_len < self.batch_size {
                break;
            }
        }

        info!(
            mapping = %mapping.short_name,
            target = %target_type,
            gaps_found = report.gaps_found,
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            limit_reached = report.limit_reached,
            "Upsampling complete"
        );

        Ok(report)
    }

    async fn fill_gap(
        &self,
        mapping: &ResolvedMapping,
        target_type: ConsolidationType,
        before: &DiagramRecord,
        after: &DiagramRecord,
        limit: usize,
        report: &mut UpsampleReport,
    ) -> Result<(), ConsolidationError> {
        let mut at = target_type.next_bucket_start(before.measurement_time);

        while at < after.measurement_time {
            if report.inserted >= limit {
                report.limit_reached = true;
                return Ok(());
            }

            match generate_record_with_interpolation(mapping, at, target_type, before, after) {
                Ok(record) => match self.store.insert_record(&record).await? {
                    InsertOutcome::Inserted => report.inserted += 1,
                    InsertOutcome::Duplicate => report.skipped += 1,
                },
                Err(e) => {
                    warn!(
                        mapping = %mapping.short_name,
                        at = %at,
                        error = %e,
                        "Interpolation failed, skipping point"
                    );
                    report.failed += 1;
                }
            }

            at = target_type.next_bucket_start(at);
        }

        debug!(
            mapping = %mapping.short_name,
            from = %before.measurement_time,
            to = %after.measurement_time,
            "Gap filled"
        );
        Ok(())
    }
}

mod common;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use diagram_backend::error::ConsolidationError;
use diagram_backend::models::consolidation_type::ConsolidationType;
use diagram_backend::models::diagram_record::RecordOrigin;
use diagram_backend::services::consolidation::ConsolidationEngine;
use diagram_backend::services::field_translation::FieldTranslator;
use diagram_backend::services::interpolation::InterpolationEngine;
use diagram_backend::services::record_store::{RecordFilter, RecordStore, SortOrder};
use diagram_backend::services::record_store_memory::MemoryRecordStore;
use serde_json::json;
use std::sync::Arc;

use crate::common::weather_mapping;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap()
}

async fn records_of(store: &MemoryRecordStore, kind: ConsolidationType) -> Vec<(DateTime<Utc>, Option<f64>, Option<f64>)> {
    store
        .find_records(&RecordFilter::for_diagram("weather").consolidation_type(kind), SortOrder::Asc, 1000, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.measurement_time, r.value("temperature"), r.value("wind")))
        .collect()
}

/// Raw samples at 06:00 and 09:00 only; hours 07 and 08 are interpolated
#[tokio::test]
async fn test_translate_consolidate_and_fill_hours() {
    let store = Arc::new(MemoryRecordStore::new());
    store.add_source_record("station", t0() + TimeDelta::seconds(5), json!({"temp": 2.0, "wind": {"speed": 4.0}}));
    store.add_source_record("station", t0() + TimeDelta::seconds(50), json!({"temp": 4.0}));
    store.add_source_record("station", t0() + TimeDelta::minutes(30), json!({"temp": 6.0, "wind": {"speed": 8.0}}));
    store.add_source_record("station", t0() + TimeDelta::hours(3), json!({"temp": 14.0, "wind": {"speed": 2.0}}));

    let mapping = weather_mapping();
    let translator = FieldTranslator::new(store.clone(), 100);
    let consolidator = ConsolidationEngine::new(store.clone(), 100);
    let interpolator = InterpolationEngine::new(store.clone(), 100);

    let translated = translator.translate_pending(&mapping, None).await.unwrap();
    assert_eq!(translated.inserted, 4);

    let range = Some((t0(), t0() + TimeDelta::hours(4)));
    let minutes = consolidator.run(&mapping, ConsolidationType::Minute, range, None).await.unwrap();
    assert_eq!(minutes.inserted, 3);

    let minute_records = records_of(&store, ConsolidationType::Minute).await;
    assert_eq!(minute_records[0], (t0(), Some(3.0), Some(4.0)));

    let hours = consolidator.run(&mapping, ConsolidationType::Hour, range, None).await.unwrap();
    assert_eq!(hours.inserted, 2);

    // 06:00 hour: minute means 3.0 and 6.0
    assert_eq!(
        records_of(&store, ConsolidationType::Hour).await,
        vec![
            (t0(), Some(4.5), Some(6.0)),
            (t0() + TimeDelta::hours(3), Some(14.0), Some(2.0)),
        ]
    );

    let filled = interpolator
        .upsample_by_consolidation_type(&mapping, ConsolidationType::Hour, 20, None)
        .await
        .unwrap();
    assert_eq!(filled.inserted, 2);

    let hours = store
        .find_records(
            &RecordFilter::for_diagram("weather").consolidation_type(ConsolidationType::Hour),
            SortOrder::Asc,
            10,
            0,
        )
        .await
        .unwrap();
    let origins: Vec<RecordOrigin> = hours.iter().map(|r| r.origin).collect();
    assert_eq!(
        origins,
        vec![
            RecordOrigin::Consolidated,
            RecordOrigin::Interpolated,
            RecordOrigin::Interpolated,
            RecordOrigin::Consolidated,
        ]
    );
    let close = |actual: Option<f64>, expected: f64| actual.is_some_and(|v| (v - expected).abs() < 1e-9);
    assert!(close(hours[1].value("temperature"), 23.0 / 3.0));
    assert!(close(hours[2].value("wind"), 10.0 / 3.0));
}

/// Re-running every stage over the same data writes nothing new
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = Arc::new(MemoryRecordStore::new());
    for i in 0..6 {
        store.add_source_record("station", t0() + TimeDelta::minutes(i * 20), json!({"temp": i}));
    }

    let mapping = weather_mapping();
    let consolidator = ConsolidationEngine::new(store.clone(), 4);
    let range = Some((t0(), t0() + TimeDelta::hours(2)));

    FieldTranslator::new(store.clone(), 4).translate_pending(&mapping, None).await.unwrap();
    consolidator.run(&mapping, ConsolidationType::Minute, range, None).await.unwrap();
    consolidator.run(&mapping, ConsolidationType::Hour, range, None).await.unwrap();
    let before = store.all_records().len();

    let minutes = consolidator.run(&mapping, ConsolidationType::Minute, range, None).await.unwrap();
    let hours = consolidator.run(&mapping, ConsolidationType::Hour, range, None).await.unwrap();

    assert_eq!(minutes.inserted + hours.inserted, 0);
    assert_eq!(minutes.skipped, 6);
    assert_eq!(hours.skipped, 2);
    assert_eq!(store.all_records().len(), before);
}

#[tokio::test]
async fn test_unprovisioned_store_fails_every_stage() {
    let store = Arc::new(MemoryRecordStore::unprovisioned("consolidation_progress"));
    let mapping = weather_mapping();

    let translated = FieldTranslator::new(store.clone(), 10).translate_pending(&mapping, None).await;
    let consolidated = ConsolidationEngine::new(store.clone(), 10)
        .run(&mapping, ConsolidationType::Minute, None, None)
        .await;
    let filled = InterpolationEngine::new(store, 10)
        .upsample_by_consolidation_type(&mapping, ConsolidationType::Minute, 5, None)
        .await;

    for result in [translated.err(), consolidated.err(), filled.err()] {
        assert!(matches!(result, Some(ConsolidationError::Storage(_))));
    }
}

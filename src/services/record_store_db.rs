//! SeaORM-backed record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, Condition as SeaCondition, DatabaseConnection, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm_migration::SchemaManager;
use tracing::{debug, warn};

use crate::entities::{consolidation_progress, diagram_records, prelude::*, source_records};
use crate::error::StoreError;
use crate::models::consolidation_type::ConsolidationType;
use crate::models::diagram_record::{DiagramRecord, RecordOrigin, SourceRecord};
use crate::services::record_store::{
    with_retry, Comparison, Condition, InsertOutcome, RecordFilter, RecordStore, SortOrder,
};

/// Tables the engines read and write
pub const REQUIRED_TABLES: [&str; 3] = ["diagram_records", "source_records", "consolidation_progress"];

pub struct DbRecordStore {
    db: DatabaseConnection,
}

impl DbRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn store_error(e: DbErr) -> StoreError {
    match e {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => StoreError::Transient(e.to_string()),
        other => {
            let message = other.to_string();
            match missing_relation(&message) {
                Some(table) => StoreError::NotProvisioned(table),
                None => StoreError::Database(message),
            }
        }
    }
}

/// Table name from a Postgres `relation "..." does not exist` error
fn missing_relation(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("relation \"")?;
    let (name, rest) = rest.split_once('"')?;
    rest.trim_start().starts_with("does not exist").then(|| name.to_string())
}

fn comparison_condition<C, T, V>(column: C, comparison: &Comparison<T>, to_value: impl Fn(&T) -> V) -> SeaCondition
where
    C: ColumnTrait,
    V: Into<sea_orm::Value>,
{
    let expr = match comparison {
        Comparison::Eq(v) => column.eq(to_value(v)),
        Comparison::In(vs) => column.is_in(vs.iter().map(&to_value)),
        Comparison::Between(lo, hi) => column.between(to_value(lo), to_value(hi)),
        Comparison::Lt(v) => column.lt(to_value(v)),
        Comparison::Lte(v) => column.lte(to_value(v)),
        Comparison::Gt(v) => column.gt(to_value(v)),
        Comparison::Gte(v) => column.gte(to_value(v)),
    };
    SeaCondition::all().add(expr)
}

fn filter_condition(filter: &RecordFilter) -> SeaCondition {
    filter.conditions.iter().fold(
        SeaCondition::all().add(diagram_records::Column::Diagram.eq(filter.diagram.as_str())),
        |acc, condition| {
            let next = match condition {
                Condition::MeasurementTime(c) => {
                    comparison_condition(diagram_records::Column::MeasurementTime, c, |t: &DateTime<Utc>| {
                        t.fixed_offset()
                    })
                }
                Condition::ConsolidationType(c) => {
                    comparison_condition(diagram_records::Column::ConsolidationType, c, |k: &ConsolidationType| {
                        k.as_i16()
                    })
                }
            };
            acc.add(next)
        },
    )
}

fn to_diagram_record(model: diagram_records::Model) -> Result<DiagramRecord, StoreError> {
    let consolidation_type =
        ConsolidationType::try_from(model.consolidation_type).map_err(StoreError::Database)?;
    let origin = model
        .origin
        .parse::<RecordOrigin>()
        .map_err(|e| StoreError::Database(format!("{} on record {}", e, model.id)))?;

    Ok(DiagramRecord {
        id: Some(model.id),
        diagram: model.diagram,
        measurement_time: model.measurement_time.with_timezone(&Utc),
        consolidation_type,
        origin,
        values: DiagramRecord::values_from_json(&model.field_values),
    })
}

fn sea_order(order: SortOrder) -> Order {
    match order {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    }
}

#[async_trait]
impl RecordStore for DbRecordStore {
    async fn ensure_provisioned(&self) -> Result<(), StoreError> {
        let manager = SchemaManager::new(&self.db);
        let manager = &manager;
        for table in REQUIRED_TABLES {
            let exists = with_retry("has_table", || async move {
                manager.has_table(table).await.map_err(store_error)
            })
            .await?;

            if !exists {
                warn!(table = table, "Required table missing");
                return Err(StoreError::NotProvisioned(table.to_string()));
            }
        }
        Ok(())
    }

    async fn find_records(
        &self,
        filter: &RecordFilter,
        order: SortOrder,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<DiagramRecord>, StoreError> {
        let models = with_retry("find_records", || async move {
            DiagramRecords::find()
                .filter(filter_condition(filter))
                .order_by(diagram_records::Column::MeasurementTime, sea_order(order))
                .order_by(diagram_records::Column::Id, sea_order(order))
                .limit(limit)
                .offset(offset)
                .all(&self.db)
                .await
                .map_err(store_error)
        })
        .await?;

        models.into_iter().map(to_diagram_record).collect()
    }

    async fn count_records(&self, filter: &RecordFilter) -> Result<u64, StoreError> {
        with_retry("count_records", || async move {
            DiagramRecords::find()
                .filter(filter_condition(filter))
                .count(&self.db)
                .await
                .map_err(store_error)
        })
        .await
    }

    async fn insert_record(&self, record: &DiagramRecord) -> Result<InsertOutcome, StoreError> {
        let result = with_retry("insert_record", || async move {
            let active = diagram_records::ActiveModel {
                diagram: Set(record.diagram.clone()),
                measurement_time: Set(record.measurement_time.fixed_offset()),
                consolidation_type: Set(record.consolidation_type.as_i16()),
                origin: Set(record.origin.as_str().to_string()),
                field_values: Set(record.values_json()),
                ..Default::default()
            };

            match DiagramRecords::insert(active)
                .on_conflict(
                    OnConflict::columns([
                        diagram_records::Column::Diagram,
                        diagram_records::Column::MeasurementTime,
                        diagram_records::Column::ConsolidationType,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await
            {
                Ok(0) | Err(DbErr::RecordNotInserted) => Ok(InsertOutcome::Duplicate),
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(e) => Err(store_error(e)),
            }
        })
        .await?;

        if result == InsertOutcome::Duplicate {
            debug!(
                diagram = %record.diagram,
                measurement_time = %record.measurement_time,
                consolidation_type = %record.consolidation_type,
                "Record already exists, skipped"
            );
        }
        Ok(result)
    }

    async fn find_source_records(
        &self,
        data_source: &str,
        after: Option<DateTime<Utc>>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        let models = with_retry("find_source_records", || async move {
            let mut query = SourceRecords::find()
                .filter(source_records::Column::DataSource.eq(data_source));
            if let Some(after) = after {
                query = query.filter(source_records::Column::MeasurementTime.gt(after.fixed_offset()));
            }

            query
                .order_by(source_records::Column::MeasurementTime, Order::Asc)
                .order_by(source_records::Column::Id, Order::Asc)
                .limit(limit)
                .offset(offset)
                .all(&self.db)
                .await
                .map_err(store_error)
        })
        .await?;

        Ok(models
            .into_iter()
            .map(|m| SourceRecord {
                id: m.id,
                data_source: m.data_source,
                measurement_time: m.measurement_time.with_timezone(&Utc),
                payload: m.payload,
            })
            .collect())
    }

    async fn last_processed(
        &self,
        mapping_id: i32,
        kind: ConsolidationType,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let progress = with_retry("last_processed", || async move {
            ConsolidationProgress::find()
                .filter(consolidation_progress::Column::MappingId.eq(mapping_id))
                .filter(consolidation_progress::Column::ConsolidationType.eq(kind.as_i16()))
                .one(&self.db)
                .await
                .map_err(store_error)
        })
        .await?;

        Ok(progress.map(|p| p.last_processed_at.with_timezone(&Utc)))
    }

    async fn set_last_processed(
        &self,
        mapping_id: i32,
        kind: ConsolidationType,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        with_retry("set_last_processed", || async move {
            let now = Utc::now().fixed_offset();
            let active = consolidation_progress::ActiveModel {
                mapping_id: Set(mapping_id),
                consolidation_type: Set(kind.as_i16()),
                last_processed_at: Set(at.fixed_offset()),
                updated_at: Set(Some(now)),
                ..Default::default()
            };

            ConsolidationProgress::insert(active)
                .on_conflict(
                    OnConflict::columns([
                        consolidation_progress::Column::MappingId,
                        consolidation_progress::Column::ConsolidationType,
                    ])
                    .update_columns([
                        consolidation_progress::Column::LastProcessedAt,
                        consolidation_progress::Column::UpdatedAt,
                    ])
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await
                .map(|_| ())
                .map_err(store_error)
        })
        .await
    }
}

//! SeaORM Entity for raw data source records

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "source_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Data source (source entity type) this record belongs to
    pub data_source: String,
    pub measurement_time: DateTimeWithTimeZone,
    /// Raw measurement payload as ingested
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

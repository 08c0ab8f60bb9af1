//! SeaORM Entity for diagram time-series records
//!
//! Unique on (diagram, measurement_time, consolidation_type).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "diagram_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub diagram: String,
    pub measurement_time: DateTimeWithTimeZone,
    /// 0=none, 1=minute, 2=hour, 3=day, 4=month
    pub consolidation_type: i16,
    /// 'translated', 'consolidated' or 'interpolated'
    pub origin: String,
    /// JSON object of value field name to number
    #[sea_orm(column_type = "JsonBinary")]
    pub field_values: Json,
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

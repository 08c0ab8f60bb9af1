//! SeaORM Entity for data source to diagram mappings

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "data_source_to_diagram_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub short_name: String,
    pub data_source: String,
    /// Name of the diagram definition written to
    pub diagram: String,
    /// Ordered JSON array of `{ source_getter, target_field }`
    #[sea_orm(column_type = "JsonBinary")]
    pub field_mappings: Json,
    /// Disabled mappings are skipped by the consolidation job
    pub enabled: bool,
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

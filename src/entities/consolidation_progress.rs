//! `SeaORM` Entity for consolidation_progress table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "consolidation_progress")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub mapping_id: i32,
    /// Granularity the progress applies to; 0 tracks translation
    pub consolidation_type: i16,
    /// Everything before this instant has been processed
    pub last_processed_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Per mapping and granularity: everything before last_processed_at is done
        manager
            .create_table(
                Table::create()
                    .table(ConsolidationProgress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsolidationProgress::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConsolidationProgress::MappingId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsolidationProgress::ConsolidationType)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsolidationProgress::LastProcessedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsolidationProgress::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consolidation_progress_mapping_type")
                    .table(ConsolidationProgress::Table)
                    .col(ConsolidationProgress::MappingId)
                    .col(ConsolidationProgress::ConsolidationType)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsolidationProgress::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ConsolidationProgress {
    Table,
    Id,
    MappingId,
    ConsolidationType,
    LastProcessedAt,
    UpdatedAt,
}

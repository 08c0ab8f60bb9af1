use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiagramRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiagramRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DiagramRecords::Diagram)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiagramRecords::MeasurementTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiagramRecords::ConsolidationType)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiagramRecords::Origin)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiagramRecords::FieldValues)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiagramRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key: one record per diagram, instant and granularity.
        // Also serves range scans of one granularity.
        manager
            .create_index(
                Index::create()
                    .name("idx_diagram_records_natural_key")
                    .table(DiagramRecords::Table)
                    .col(DiagramRecords::Diagram)
                    .col(DiagramRecords::ConsolidationType)
                    .col(DiagramRecords::MeasurementTime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_diagram_records_diagram_time")
                    .table(DiagramRecords::Table)
                    .col(DiagramRecords::Diagram)
                    .col(DiagramRecords::MeasurementTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DiagramRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DiagramRecords {
    Table,
    Id,
    Diagram,
    MeasurementTime,
    ConsolidationType,
    Origin,
    FieldValues,
    CreatedAt,
}

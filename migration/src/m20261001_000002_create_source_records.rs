use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SourceRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SourceRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SourceRecords::DataSource)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SourceRecords::MeasurementTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SourceRecords::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SourceRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Translation scans one data source in time order
        manager
            .create_index(
                Index::create()
                    .name("idx_source_records_source_time")
                    .table(SourceRecords::Table)
                    .col(SourceRecords::DataSource)
                    .col(SourceRecords::MeasurementTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SourceRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SourceRecords {
    Table,
    Id,
    DataSource,
    MeasurementTime,
    Payload,
    CreatedAt,
}

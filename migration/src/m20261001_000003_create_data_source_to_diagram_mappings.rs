use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DataSourceToDiagramMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DataSourceToDiagramMappings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DataSourceToDiagramMappings::ShortName)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DataSourceToDiagramMappings::DataSource)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DataSourceToDiagramMappings::Diagram)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DataSourceToDiagramMappings::FieldMappings)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DataSourceToDiagramMappings::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(DataSourceToDiagramMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DataSourceToDiagramMappings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DataSourceToDiagramMappings {
    Table,
    Id,
    ShortName,
    DataSource,
    Diagram,
    FieldMappings,
    Enabled,
    CreatedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiagramDefinitions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiagramDefinitions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DiagramDefinitions::Name)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DiagramDefinitions::ValueFields)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiagramDefinitions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DiagramDefinitions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DiagramDefinitions {
    Table,
    Id,
    Name,
    ValueFields,
    CreatedAt,
}

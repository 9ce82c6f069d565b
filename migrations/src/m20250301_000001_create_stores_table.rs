use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Stores::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Stores::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Stores::Name).string().not_null())
                    .col(
                        ColumnDef::new(Stores::Subdomain)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Stores::AbacatepayApiKey).string().null())
                    .col(
                        ColumnDef::new(Stores::AbacatepayWebhookSecret)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Stores::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Stores::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Stores::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Stores {
    Table,
    Id,
    Name,
    Subdomain,
    AbacatepayApiKey,
    AbacatepayWebhookSecret,
    Active,
    CreatedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserPointsAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPointsAccounts::UserId)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserPointsAccounts::Balance)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserPointsAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserPointsTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPointsTransactions::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserPointsTransactions::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserPointsTransactions::OrderId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UserPointsTransactions::Points)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserPointsTransactions::Reason)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserPointsTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_points_transactions_user")
                    .table(UserPointsTransactions::Table)
                    .col(UserPointsTransactions::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InfluencerPointsAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InfluencerPointsAccounts::InfluencerId)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfluencerPointsAccounts::Balance)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InfluencerPointsAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InfluencerPointsTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InfluencerPointsTransactions::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfluencerPointsTransactions::InfluencerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfluencerPointsTransactions::OrderId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(InfluencerPointsTransactions::Points)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfluencerPointsTransactions::Reason)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfluencerPointsTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(InfluencerPointsTransactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(InfluencerPointsAccounts::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(UserPointsTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserPointsAccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum UserPointsAccounts {
    Table,
    UserId,
    Balance,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum UserPointsTransactions {
    Table,
    Id,
    UserId,
    OrderId,
    Points,
    Reason,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum InfluencerPointsAccounts {
    Table,
    InfluencerId,
    Balance,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum InfluencerPointsTransactions {
    Table,
    Id,
    InfluencerId,
    OrderId,
    Points,
    Reason,
    CreatedAt,
}

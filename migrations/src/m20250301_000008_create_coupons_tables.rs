use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Coupons::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Coupons::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Coupons::Kind).string().not_null())
                    .col(ColumnDef::new(Coupons::Value).big_integer().not_null())
                    .col(
                        ColumnDef::new(Coupons::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Coupons::UsedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Coupons::InfluencerId).uuid().null())
                    .col(ColumnDef::new(Coupons::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CouponRedemptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CouponRedemptions::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CouponRedemptions::CouponId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CouponRedemptions::OrderId).uuid().not_null())
                    .col(ColumnDef::new(CouponRedemptions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CouponRedemptions::AmountDiscountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CouponRedemptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CouponRedemptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Coupons::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Coupons {
    Table,
    Id,
    Code,
    Kind,
    Value,
    Active,
    UsedCount,
    InfluencerId,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum CouponRedemptions {
    Table,
    Id,
    CouponId,
    OrderId,
    UserId,
    AmountDiscountCents,
    CreatedAt,
}

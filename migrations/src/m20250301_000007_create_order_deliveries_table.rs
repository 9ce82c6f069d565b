use sea_orm_migration::prelude::*;

use crate::m20250301_000005_create_orders_table::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderDeliveries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderDeliveries::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderDeliveries::OrderId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OrderDeliveries::Street).string().not_null())
                    .col(ColumnDef::new(OrderDeliveries::Number).string().not_null())
                    .col(
                        ColumnDef::new(OrderDeliveries::District)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderDeliveries::City).string().not_null())
                    .col(ColumnDef::new(OrderDeliveries::State).string().not_null())
                    .col(ColumnDef::new(OrderDeliveries::Zip).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_deliveries_order")
                            .from(OrderDeliveries::Table, OrderDeliveries::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderDeliveries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OrderDeliveries {
    Table,
    Id,
    OrderId,
    Street,
    Number,
    District,
    City,
    State,
    Zip,
}

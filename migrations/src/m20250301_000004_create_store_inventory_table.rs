use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoreInventory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoreInventory::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StoreInventory::StoreId).uuid().not_null())
                    .col(ColumnDef::new(StoreInventory::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(StoreInventory::Quantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_store_inventory_store_product")
                    .table(StoreInventory::Table)
                    .col(StoreInventory::StoreId)
                    .col(StoreInventory::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoreInventory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StoreInventory {
    Table,
    Id,
    StoreId,
    ProductId,
    Quantity,
}

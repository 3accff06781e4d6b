use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260108_000001_create_materials_table::Migration),
            Box::new(m20260108_000002_create_inventory_table::Migration),
            Box::new(m20260109_000003_create_ddts_table::Migration),
            Box::new(m20260109_000004_create_ddt_items_table::Migration),
            Box::new(m20260108_000005_create_stock_movements_table::Migration),
            Box::new(m20260108_000006_create_site_materials_table::Migration),
        ]
    }
}

mod m20260108_000001_create_materials_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260108_000001_create_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(ColumnDef::new(Materials::Unit).string().not_null())
                        .col(
                            ColumnDef::new(Materials::StandardCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::IsRentable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Materials::QuantityOutOnRental)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Materials::RentalPriceDaily).decimal_len(16, 4))
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Materials {
        Table,
        Id,
        Name,
        Unit,
        StandardCost,
        IsRentable,
        QuantityOutOnRental,
        RentalPriceDaily,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260108_000002_create_inventory_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260108_000002_create_inventory_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Inventory::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Inventory::MaterialId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Inventory::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inventory::QuantityAvailable)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::QuantityReserved)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::QuantityInTransit)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Inventory::MinimumStock).decimal_len(16, 4))
                        .col(ColumnDef::new(Inventory::MaximumStock).decimal_len(16, 4))
                        .col(ColumnDef::new(Inventory::LastCountDate).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Inventory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inventory::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One counter row per (material, warehouse) pair.
            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_material_warehouse")
                        .table(Inventory::Table)
                        .col(Inventory::MaterialId)
                        .col(Inventory::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Inventory {
        Table,
        Id,
        MaterialId,
        WarehouseId,
        QuantityAvailable,
        QuantityReserved,
        QuantityInTransit,
        MinimumStock,
        MaximumStock,
        LastCountDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260109_000003_create_ddts_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260109_000003_create_ddts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Ddts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Ddts::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Ddts::Code).string().not_null())
                        .col(ColumnDef::new(Ddts::DdtType).string().not_null())
                        .col(ColumnDef::new(Ddts::Status).string().not_null())
                        .col(ColumnDef::new(Ddts::DdtNumber).string())
                        .col(
                            ColumnDef::new(Ddts::DdtDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Ddts::DeliveredAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(Ddts::CarrierName).string())
                        .col(ColumnDef::new(Ddts::TrackingNumber).string())
                        .col(ColumnDef::new(Ddts::FromWarehouseId).big_integer())
                        .col(ColumnDef::new(Ddts::ToWarehouseId).big_integer())
                        .col(ColumnDef::new(Ddts::SiteId).big_integer())
                        .col(ColumnDef::new(Ddts::SupplierId).big_integer())
                        .col(ColumnDef::new(Ddts::CustomerId).big_integer())
                        .col(ColumnDef::new(Ddts::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(Ddts::Notes).string())
                        .col(ColumnDef::new(Ddts::DeletedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Ddts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Ddts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Advisory human-facing numbering; uniqueness is the backstop
            // against the non-atomic count+1 generator.
            manager
                .create_index(
                    Index::create()
                        .name("idx_ddts_code")
                        .table(Ddts::Table)
                        .col(Ddts::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Ddts::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Ddts {
        Table,
        Id,
        Code,
        DdtType,
        Status,
        DdtNumber,
        DdtDate,
        DeliveredAt,
        CarrierName,
        TrackingNumber,
        FromWarehouseId,
        ToWarehouseId,
        SiteId,
        SupplierId,
        CustomerId,
        CreatedBy,
        Notes,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260109_000004_create_ddt_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260109_000004_create_ddt_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DdtItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DdtItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(DdtItems::DdtId).big_integer().not_null())
                        .col(ColumnDef::new(DdtItems::MaterialId).big_integer().not_null())
                        .col(
                            ColumnDef::new(DdtItems::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DdtItems::UnitCost).decimal_len(16, 4))
                        .col(ColumnDef::new(DdtItems::Position).integer().not_null())
                        .col(
                            ColumnDef::new(DdtItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_ddt_items_ddt")
                        .table(DdtItems::Table)
                        .col(DdtItems::DdtId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DdtItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum DdtItems {
        Table,
        Id,
        DdtId,
        MaterialId,
        Quantity,
        UnitCost,
        Position,
        CreatedAt,
    }
}

mod m20260108_000005_create_stock_movements_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260108_000005_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockMovements::Code).string().not_null())
                        .col(ColumnDef::new(StockMovements::DdtId).big_integer())
                        .col(
                            ColumnDef::new(StockMovements::MaterialId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::MovementType).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::UnitCost).decimal_len(16, 4))
                        .col(
                            ColumnDef::new(StockMovements::MovementDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::FromWarehouseId).big_integer())
                        .col(ColumnDef::new(StockMovements::ToWarehouseId).big_integer())
                        .col(ColumnDef::new(StockMovements::SiteId).big_integer())
                        .col(ColumnDef::new(StockMovements::SupplierId).big_integer())
                        .col(ColumnDef::new(StockMovements::SupplierDocument).string())
                        .col(ColumnDef::new(StockMovements::ReferenceDocument).string())
                        .col(ColumnDef::new(StockMovements::ActorId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::Notes).string())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_movements_material_warehouse")
                        .table(StockMovements::Table)
                        .col(StockMovements::MaterialId)
                        .col(StockMovements::WarehouseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_movements_movement_date")
                        .table(StockMovements::Table)
                        .col(StockMovements::MovementDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum StockMovements {
        Table,
        Id,
        Code,
        DdtId,
        MaterialId,
        WarehouseId,
        MovementType,
        Quantity,
        UnitCost,
        MovementDate,
        FromWarehouseId,
        ToWarehouseId,
        SiteId,
        SupplierId,
        SupplierDocument,
        ReferenceDocument,
        ActorId,
        Notes,
        CreatedAt,
    }
}

mod m20260108_000006_create_site_materials_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260108_000006_create_site_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SiteMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SiteMaterials::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SiteMaterials::SiteId).big_integer().not_null())
                        .col(
                            ColumnDef::new(SiteMaterials::MaterialId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SiteMaterials::QuoteItemId).big_integer())
                        .col(
                            ColumnDef::new(SiteMaterials::IsExtra)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(SiteMaterials::ExtraReason).string())
                        .col(ColumnDef::new(SiteMaterials::RequestedBy).uuid())
                        .col(ColumnDef::new(SiteMaterials::RequestedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(SiteMaterials::PlannedQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SiteMaterials::AllocatedQuantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SiteMaterials::DeliveredQuantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SiteMaterials::UsedQuantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SiteMaterials::ReturnedQuantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SiteMaterials::PlannedUnitCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SiteMaterials::ActualUnitCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SiteMaterials::Status).string().not_null())
                        .col(ColumnDef::new(SiteMaterials::RequiredDate).timestamp_with_time_zone())
                        .col(ColumnDef::new(SiteMaterials::DeliveryDate).timestamp_with_time_zone())
                        .col(ColumnDef::new(SiteMaterials::Notes).string())
                        .col(ColumnDef::new(SiteMaterials::DeletedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(SiteMaterials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SiteMaterials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_site_materials_site")
                        .table(SiteMaterials::Table)
                        .col(SiteMaterials::SiteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SiteMaterials::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum SiteMaterials {
        Table,
        Id,
        SiteId,
        MaterialId,
        QuoteItemId,
        IsExtra,
        ExtraReason,
        RequestedBy,
        RequestedAt,
        PlannedQuantity,
        AllocatedQuantity,
        DeliveredQuantity,
        UsedQuantity,
        ReturnedQuantity,
        PlannedUnitCost,
        ActualUnitCost,
        Status,
        RequiredDate,
        DeliveryDate,
        Notes,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

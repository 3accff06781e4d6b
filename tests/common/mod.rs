#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use sitestock_api::{
    db::DbPool,
    entities::material,
    events::{process_events, EventSender},
    migrator::Migrator,
    services::{
        materials::CreateMaterialRequest, DdtService, InventoryService, MaterialCatalogService,
        SiteMaterialService,
    },
};

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub inventory: InventoryService,
    pub ddts: DdtService,
    pub site_materials: SiteMaterialService,
    pub materials: MaterialCatalogService,
}

pub async fn setup() -> TestApp {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    let db = Arc::new(db);

    let (tx, rx) = mpsc::channel(1024);
    tokio::spawn(process_events(rx));
    let sender = Arc::new(EventSender::new(tx));

    TestApp {
        inventory: InventoryService::new(db.clone(), sender.clone()),
        ddts: DdtService::new(db.clone(), sender.clone()),
        site_materials: SiteMaterialService::new(db.clone(), sender.clone()),
        materials: MaterialCatalogService::new(db.clone()),
        db,
    }
}

/// Same wiring with the event receiver dropped up front, so every send hits a
/// closed channel.
pub async fn setup_without_consumer() -> TestApp {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    let db = Arc::new(db);

    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let sender = Arc::new(EventSender::new(tx));

    TestApp {
        inventory: InventoryService::new(db.clone(), sender.clone()),
        ddts: DdtService::new(db.clone(), sender.clone()),
        site_materials: SiteMaterialService::new(db.clone(), sender.clone()),
        materials: MaterialCatalogService::new(db.clone()),
        db,
    }
}

pub fn actor() -> Uuid {
    Uuid::new_v4()
}

pub async fn create_material(app: &TestApp, name: &str, cost: Decimal) -> material::Model {
    app.materials
        .create(CreateMaterialRequest {
            name: name.to_string(),
            unit: "pcs".to_string(),
            standard_cost: cost,
            is_rentable: false,
            rental_price_daily: None,
        })
        .await
        .expect("create material")
}

pub async fn create_rentable_material(app: &TestApp, name: &str) -> material::Model {
    app.materials
        .create(CreateMaterialRequest {
            name: name.to_string(),
            unit: "pcs".to_string(),
            standard_cost: Decimal::new(1500, 2),
            is_rentable: true,
            rental_price_daily: Some(Decimal::new(500, 2)),
        })
        .await
        .expect("create rentable material")
}

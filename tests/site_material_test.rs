mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use sitestock_api::{
    entities::stock_movement,
    errors::ServiceError,
    services::{
        ddt::{CreateDdtRequest, DdtItemInput},
        inventory::{IntakeRequest, InventoryFilter},
        site_material::{
            CreateSiteMaterialRequest, DeliverRequest, ReserveRequest, ReturnRequest,
            TransferToSiteRequest, UpdateSiteMaterialRequest,
        },
    },
};

use common::{actor, create_material, setup, TestApp};

const WAREHOUSE: i64 = 1;
const SITE: i64 = 7;
const OTHER_SITE: i64 = 8;

async fn seed_stock(app: &TestApp, material_id: i64, quantity: Decimal) {
    app.inventory
        .intake(IntakeRequest {
            material_id,
            warehouse_id: WAREHOUSE,
            quantity,
            unit_cost: None,
            supplier_id: None,
            supplier_document: None,
            notes: None,
            actor_id: actor(),
        })
        .await
        .unwrap();
}

async fn plan_line(
    app: &TestApp,
    material_id: i64,
    planned: Decimal,
) -> sitestock_api::entities::site_material::Model {
    app.site_materials
        .create(CreateSiteMaterialRequest {
            site_id: SITE,
            material_id,
            quote_item_id: Some(501),
            planned_quantity: planned,
            planned_unit_cost: None,
            extra_reason: None,
            required_date: None,
            requested_by: None,
            notes: None,
        })
        .await
        .unwrap()
}

async fn counters(app: &TestApp, material_id: i64) -> (Decimal, Decimal) {
    let rows = app
        .inventory
        .get_inventory(InventoryFilter {
            material_id: Some(material_id),
            warehouse_id: Some(WAREHOUSE),
        })
        .await
        .unwrap();
    let row = rows.first().expect("inventory row");
    (row.quantity_available, row.quantity_reserved)
}

async fn journal_count(app: &TestApp, material_id: i64) -> u64 {
    stock_movement::Entity::find()
        .filter(stock_movement::Column::MaterialId.eq(material_id))
        .count(app.db.as_ref())
        .await
        .unwrap()
}

#[tokio::test]
async fn reserve_then_partial_delivery_walks_the_lifecycle() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    seed_stock(&app, mat.id, dec!(100)).await;
    let who = actor();

    let line = plan_line(&app, mat.id, dec!(30)).await;
    assert_eq!(line.status, "planned");
    assert!(!line.is_extra);

    let reserved = app
        .site_materials
        .reserve(
            SITE,
            line.id,
            ReserveRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(30),
                actor_id: who,
            },
        )
        .await
        .unwrap();
    assert_eq!(reserved.status, "reserved");
    assert_eq!(reserved.allocated_quantity, dec!(30));
    assert_eq!(counters(&app, mat.id).await, (dec!(100), dec!(30)));
    // earmarking writes no journal row, only the intake is there
    assert_eq!(journal_count(&app, mat.id).await, 1);

    let delivered = app
        .site_materials
        .deliver(
            SITE,
            line.id,
            DeliverRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(20),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap();
    assert_eq!(delivered.status, "partial");
    assert_eq!(delivered.delivered_quantity, dec!(20));
    assert_eq!(delivered.used_quantity, dec!(20));
    assert_eq!(delivered.allocated_quantity, dec!(10));
    assert_eq!(counters(&app, mat.id).await, (dec!(80), dec!(10)));
    assert_eq!(journal_count(&app, mat.id).await, 2);
}

#[tokio::test]
async fn returns_roll_the_status_back() {
    let app = setup().await;
    let mat = create_material(&app, "Bricks", dec!(0.80)).await;
    seed_stock(&app, mat.id, dec!(50)).await;
    let who = actor();

    let line = plan_line(&app, mat.id, dec!(30)).await;
    app.site_materials
        .deliver(
            SITE,
            line.id,
            DeliverRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(20),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap();

    let partial = app
        .site_materials
        .return_material(
            SITE,
            line.id,
            ReturnRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(5),
                notes: Some("over-ordered".into()),
                actor_id: who,
            },
        )
        .await
        .unwrap();
    assert_eq!(partial.status, "partial");
    assert_eq!(partial.returned_quantity, dec!(5));
    assert_eq!(partial.used_quantity, dec!(15));
    assert_eq!(counters(&app, mat.id).await.0, dec!(35));

    // returning everything leaves a net of zero on site
    let reset = app
        .site_materials
        .return_material(
            SITE,
            line.id,
            ReturnRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(15),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap();
    assert_eq!(reset.status, "planned");
    assert_eq!(reset.used_quantity, dec!(0));
    assert_eq!(counters(&app, mat.id).await.0, dec!(50));

    let over = app
        .site_materials
        .return_material(
            SITE,
            line.id,
            ReturnRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(1),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(over, ServiceError::ExceedsDelivered(_));
}

#[tokio::test]
async fn open_outbound_document_blocks_direct_delivery() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    seed_stock(&app, mat.id, dec!(60)).await;
    let who = actor();

    let line = plan_line(&app, mat.id, dec!(40)).await;

    let ddt = app
        .ddts
        .create(CreateDdtRequest {
            ddt_type: sitestock_api::entities::ddt::DdtType::Outbound,
            ddt_number: None,
            ddt_date: None,
            carrier_name: None,
            tracking_number: None,
            from_warehouse_id: Some(WAREHOUSE),
            to_warehouse_id: None,
            site_id: Some(SITE),
            supplier_id: None,
            customer_id: None,
            notes: None,
            items: vec![DdtItemInput {
                material_id: mat.id,
                quantity: dec!(10),
                unit_cost: None,
            }],
            actor_id: who,
        })
        .await
        .unwrap();

    let blocked = app
        .site_materials
        .deliver(
            SITE,
            line.id,
            DeliverRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(10),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(blocked, ServiceError::ConflictingDocument(_));
    // the refused delivery left no trace in the journal
    assert_eq!(journal_count(&app, mat.id).await, 1);
    assert_eq!(counters(&app, mat.id).await.0, dec!(60));

    // once the document is resolved the direct path opens up again
    app.ddts.cancel(ddt.ddt.id, None, who).await.unwrap();
    let delivered = app
        .site_materials
        .deliver(
            SITE,
            line.id,
            DeliverRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(10),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap();
    assert_eq!(delivered.delivered_quantity, dec!(10));
}

#[tokio::test]
async fn usage_log_is_capped_at_the_plan() {
    let app = setup().await;
    let mat = create_material(&app, "Sand", dec!(0.60)).await;
    let line = plan_line(&app, mat.id, dec!(10)).await;

    let in_use = app
        .site_materials
        .log_usage(SITE, line.id, dec!(4), Some("footing pour".into()))
        .await
        .unwrap();
    assert_eq!(in_use.status, "in_use");
    assert_eq!(in_use.used_quantity, dec!(4));

    let done = app
        .site_materials
        .log_usage(SITE, line.id, dec!(6), None)
        .await
        .unwrap();
    assert_eq!(done.status, "completed");

    let over = app
        .site_materials
        .log_usage(SITE, line.id, dec!(1), None)
        .await
        .unwrap_err();
    assert_matches!(over, ServiceError::ExceedsPlanned(_));
}

#[tokio::test]
async fn site_to_site_transfer_skips_the_warehouse() {
    let app = setup().await;
    let mat = create_material(&app, "Scaffolding", dec!(12.50)).await;
    seed_stock(&app, mat.id, dec!(40)).await;
    let who = actor();

    let line = plan_line(&app, mat.id, dec!(25)).await;
    app.site_materials
        .deliver(
            SITE,
            line.id,
            DeliverRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(25),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap();
    let journal_before = journal_count(&app, mat.id).await;

    let too_much = app
        .site_materials
        .transfer_to_site(
            SITE,
            line.id,
            TransferToSiteRequest {
                to_site_id: OTHER_SITE,
                quantity: dec!(30),
                reason: None,
                actor_id: who,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(too_much, ServiceError::ExceedsAvailable(_));

    let (source, destination) = app
        .site_materials
        .transfer_to_site(
            SITE,
            line.id,
            TransferToSiteRequest {
                to_site_id: OTHER_SITE,
                quantity: dec!(10),
                reason: Some("urgent need next door".into()),
                actor_id: who,
            },
        )
        .await
        .unwrap();

    assert_eq!(source.returned_quantity, dec!(10));
    assert_eq!(source.used_quantity, dec!(15));
    assert!(destination.is_extra);
    assert_eq!(destination.site_id, OTHER_SITE);
    assert_eq!(destination.planned_quantity, dec!(10));
    assert_eq!(destination.delivered_quantity, dec!(10));
    assert_eq!(destination.status, "completed");

    // no warehouse leg: counters and journal untouched
    assert_eq!(counters(&app, mat.id).await.0, dec!(15));
    assert_eq!(journal_count(&app, mat.id).await, journal_before);

    assert_matches!(
        app.site_materials
            .transfer_to_site(
                SITE,
                line.id,
                TransferToSiteRequest {
                    to_site_id: SITE,
                    quantity: dec!(1),
                    reason: None,
                    actor_id: who,
                },
            )
            .await
            .unwrap_err(),
        ServiceError::ValidationError(_)
    );
}

#[tokio::test]
async fn delete_is_allowed_only_before_stock_effects() {
    let app = setup().await;
    let mat = create_material(&app, "Plaster", dec!(2.20)).await;
    seed_stock(&app, mat.id, dec!(20)).await;
    let who = actor();

    let untouched = plan_line(&app, mat.id, dec!(5)).await;
    app.site_materials.delete(SITE, untouched.id).await.unwrap();
    assert_matches!(
        app.site_materials.get(SITE, untouched.id).await.unwrap_err(),
        ServiceError::NotFound(_)
    );

    let delivered = plan_line(&app, mat.id, dec!(5)).await;
    app.site_materials
        .deliver(
            SITE,
            delivered.id,
            DeliverRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(5),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap();
    assert_matches!(
        app.site_materials.delete(SITE, delivered.id).await.unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
}

#[tokio::test]
async fn records_are_scoped_to_their_site() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    let line = plan_line(&app, mat.id, dec!(5)).await;

    assert_matches!(
        app.site_materials.get(OTHER_SITE, line.id).await.unwrap_err(),
        ServiceError::OwnershipMismatch(_)
    );
    assert_matches!(
        app.site_materials
            .log_usage(OTHER_SITE, line.id, dec!(1), None)
            .await
            .unwrap_err(),
        ServiceError::OwnershipMismatch(_)
    );
    assert_matches!(
        app.site_materials.get(SITE, 99_999).await.unwrap_err(),
        ServiceError::NotFound(_)
    );
}

#[tokio::test]
async fn quoteless_records_are_extras_and_priced_at_standard_cost() {
    let app = setup().await;
    let mat = create_material(&app, "Waterproofing", dec!(18.00)).await;

    let extra = app
        .site_materials
        .create(CreateSiteMaterialRequest {
            site_id: SITE,
            material_id: mat.id,
            quote_item_id: None,
            planned_quantity: dec!(3),
            planned_unit_cost: None,
            extra_reason: Some("unexpected groundwater".into()),
            required_date: None,
            requested_by: Some(Uuid::new_v4()),
            notes: None,
        })
        .await
        .unwrap();
    assert!(extra.is_extra);
    assert_eq!(extra.extra_reason.as_deref(), Some("unexpected groundwater"));
    assert_eq!(extra.planned_unit_cost, dec!(18.00));
    assert_eq!(extra.actual_unit_cost, dec!(18.00));

    // extras summary prices each row at actual cost times net usage
    app.site_materials
        .log_usage(SITE, extra.id, dec!(2), None)
        .await
        .unwrap();
    let summary = app.site_materials.list_extras(SITE).await.unwrap();
    assert_eq!(summary.extras.len(), 1);
    assert_eq!(summary.total_extra_cost, dec!(36.00));
}

#[tokio::test]
async fn plan_cannot_shrink_below_what_was_delivered() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    seed_stock(&app, mat.id, dec!(30)).await;
    let who = actor();

    let line = plan_line(&app, mat.id, dec!(20)).await;
    app.site_materials
        .deliver(
            SITE,
            line.id,
            DeliverRequest {
                warehouse_id: WAREHOUSE,
                quantity: dec!(15),
                notes: None,
                actor_id: who,
            },
        )
        .await
        .unwrap();

    assert_matches!(
        app.site_materials
            .update(
                SITE,
                line.id,
                UpdateSiteMaterialRequest {
                    planned_quantity: Some(dec!(10)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err(),
        ServiceError::ValidationError(_)
    );

    // growing the plan re-derives the status
    let grown = app
        .site_materials
        .update(
            SITE,
            line.id,
            UpdateSiteMaterialRequest {
                planned_quantity: Some(dec!(40)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(grown.planned_quantity, dec!(40));
    assert_eq!(grown.status, "partial");
}

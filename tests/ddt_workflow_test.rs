mod common;

use assert_matches::assert_matches;
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use sitestock_api::{
    entities::{ddt::DdtType, stock_movement},
    errors::ServiceError,
    services::{
        ddt::{CreateDdtRequest, DdtItemInput, UpdateDdtRequest},
        inventory::{IntakeRequest, InventoryFilter},
    },
};

use common::{actor, create_material, create_rentable_material, setup};

const WH_MAIN: i64 = 1;
const WH_SOUTH: i64 = 2;
const SITE: i64 = 10;

fn outbound_request(material_id: i64, quantity: Decimal) -> CreateDdtRequest {
    CreateDdtRequest {
        ddt_type: DdtType::Outbound,
        ddt_number: None,
        ddt_date: None,
        carrier_name: None,
        tracking_number: None,
        from_warehouse_id: Some(WH_MAIN),
        to_warehouse_id: None,
        site_id: Some(SITE),
        supplier_id: None,
        customer_id: None,
        notes: None,
        items: vec![DdtItemInput {
            material_id,
            quantity,
            unit_cost: None,
        }],
        actor_id: actor(),
    }
}

async fn stock_at(app: &common::TestApp, material_id: i64, warehouse_id: i64) -> Decimal {
    let rows = app
        .inventory
        .get_inventory(InventoryFilter {
            material_id: Some(material_id),
            warehouse_id: Some(warehouse_id),
        })
        .await
        .unwrap();
    rows.first()
        .map(|r| r.quantity_available)
        .unwrap_or(Decimal::ZERO)
}

async fn seed_stock(app: &common::TestApp, material_id: i64, quantity: Decimal) {
    app.inventory
        .intake(IntakeRequest {
            material_id,
            warehouse_id: WH_MAIN,
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

#[tokio::test]
async fn codes_are_sequential_within_the_year() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    let year = Utc::now().year();

    let first = app.ddts.create(outbound_request(mat.id, dec!(5))).await.unwrap();
    let second = app.ddts.create(outbound_request(mat.id, dec!(5))).await.unwrap();

    assert_eq!(first.ddt.code, format!("DDT-{}-0001", year));
    assert_eq!(second.ddt.code, format!("DDT-{}-0002", year));
    assert_eq!(first.ddt.status, "issued");
    assert_eq!(first.items.len(), 1);
}

#[tokio::test]
async fn create_validates_header_per_type() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;

    let mut missing_warehouse = outbound_request(mat.id, dec!(5));
    missing_warehouse.from_warehouse_id = None;
    assert_matches!(
        app.ddts.create(missing_warehouse).await.unwrap_err(),
        ServiceError::ValidationError(_)
    );

    let mut same_warehouse = outbound_request(mat.id, dec!(5));
    same_warehouse.ddt_type = DdtType::Transfer;
    same_warehouse.to_warehouse_id = Some(WH_MAIN);
    assert_matches!(
        app.ddts.create(same_warehouse).await.unwrap_err(),
        ServiceError::ValidationError(_)
    );

    let mut no_items = outbound_request(mat.id, dec!(5));
    no_items.items.clear();
    assert_matches!(
        app.ddts.create(no_items).await.unwrap_err(),
        ServiceError::ValidationError(_)
    );
}

#[tokio::test]
async fn transition_matrix_is_enforced() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    seed_stock(&app, mat.id, dec!(50)).await;
    let who = actor();

    let created = app.ddts.create(outbound_request(mat.id, dec!(10))).await.unwrap();
    let id = created.ddt.id;

    // issued -> in_transit -> delivered
    let in_transit = app.ddts.mark_in_transit(id).await.unwrap();
    assert_eq!(in_transit.status, "in_transit");

    // in_transit again is invalid
    assert_matches!(
        app.ddts.mark_in_transit(id).await.unwrap_err(),
        ServiceError::InvalidTransition(_)
    );

    let confirmed = app.ddts.confirm(id, who).await.unwrap();
    assert_eq!(confirmed.ddt.status, "delivered");
    assert!(confirmed.ddt.delivered_at.is_some());

    // delivered documents are frozen
    assert_matches!(
        app.ddts.confirm(id, who).await.unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
    assert_matches!(
        app.ddts.cancel(id, None, who).await.unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
    assert_matches!(
        app.ddts
            .update(id, UpdateDdtRequest::default())
            .await
            .unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
}

#[tokio::test]
async fn confirm_inbound_increases_destination_stock() {
    let app = setup().await;
    let mat = create_material(&app, "Gravel", dec!(1.10)).await;
    let who = actor();

    let created = app
        .ddts
        .create(CreateDdtRequest {
            ddt_type: DdtType::Inbound,
            ddt_number: Some("SUP-990".into()),
            ddt_date: None,
            carrier_name: None,
            tracking_number: None,
            from_warehouse_id: None,
            to_warehouse_id: Some(WH_MAIN),
            site_id: None,
            supplier_id: Some(3),
            customer_id: None,
            notes: None,
            items: vec![DdtItemInput {
                material_id: mat.id,
                quantity: dec!(80),
                unit_cost: Some(dec!(1.05)),
            }],
            actor_id: who,
        })
        .await
        .unwrap();

    let outcome = app.ddts.confirm(created.ddt.id, who).await.unwrap();
    assert_eq!(outcome.movements.len(), 1);
    assert_eq!(outcome.movements[0].movement_type, "intake");
    assert_eq!(outcome.movements[0].supplier_document.as_deref(), Some("SUP-990"));
    assert_eq!(stock_at(&app, mat.id, WH_MAIN).await, dec!(80));
}

#[tokio::test]
async fn mark_delivered_applies_the_same_effects_as_confirm() {
    let app = setup().await;
    let mat = create_material(&app, "Plasterboard", dec!(3.20)).await;
    seed_stock(&app, mat.id, dec!(50)).await;
    let who = actor();

    let created = app.ddts.create(outbound_request(mat.id, dec!(20))).await.unwrap();
    let outcome = app.ddts.mark_delivered(created.ddt.id, who).await.unwrap();

    assert_eq!(outcome.ddt.status, "delivered");
    assert!(outcome.ddt.delivered_at.is_some());
    assert_eq!(outcome.movements.len(), 1);
    assert_eq!(stock_at(&app, mat.id, WH_MAIN).await, dec!(30));

    // the alias obeys the same transition matrix
    assert_matches!(
        app.ddts.mark_delivered(created.ddt.id, who).await.unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
}

#[tokio::test]
async fn confirm_outbound_fans_out_to_site_materials() {
    let app = setup().await;
    let mat = create_material(&app, "Rebar", dec!(2.00)).await;
    seed_stock(&app, mat.id, dec!(100)).await;
    let who = actor();

    let created = app.ddts.create(outbound_request(mat.id, dec!(40))).await.unwrap();
    app.ddts.confirm(created.ddt.id, who).await.unwrap();

    assert_eq!(stock_at(&app, mat.id, WH_MAIN).await, dec!(60));

    // no plan line existed, so the fan-out created an extra record
    let rows = app.site_materials.list_for_site(SITE).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_extra);
    assert_eq!(rows[0].delivered_quantity, dec!(40));
    assert_eq!(rows[0].status, "completed");
}

#[tokio::test]
async fn confirm_with_insufficient_stock_rolls_back_whole_document() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    seed_stock(&app, mat.id, dec!(10)).await;
    let who = actor();

    let created = app.ddts.create(outbound_request(mat.id, dec!(25))).await.unwrap();
    let err = app.ddts.confirm(created.ddt.id, who).await.unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // document still open, stock untouched, no ddt movements journaled
    let reloaded = app.ddts.get_by_id(created.ddt.id).await.unwrap();
    assert_eq!(reloaded.ddt.status, "issued");
    assert_eq!(stock_at(&app, mat.id, WH_MAIN).await, dec!(10));
    let ddt_movements = stock_movement::Entity::find()
        .filter(stock_movement::Column::DdtId.eq(created.ddt.id))
        .count(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(ddt_movements, 0);
}

#[tokio::test]
async fn confirm_transfer_moves_stock_between_warehouses() {
    let app = setup().await;
    let mat = create_material(&app, "Blocks", dec!(1.50)).await;
    seed_stock(&app, mat.id, dec!(30)).await;
    let who = actor();

    let created = app
        .ddts
        .create(CreateDdtRequest {
            ddt_type: DdtType::Transfer,
            ddt_number: None,
            ddt_date: None,
            carrier_name: None,
            tracking_number: None,
            from_warehouse_id: Some(WH_MAIN),
            to_warehouse_id: Some(WH_SOUTH),
            site_id: None,
            supplier_id: None,
            customer_id: None,
            notes: None,
            items: vec![DdtItemInput {
                material_id: mat.id,
                quantity: dec!(12),
                unit_cost: None,
            }],
            actor_id: who,
        })
        .await
        .unwrap();

    app.ddts.confirm(created.ddt.id, who).await.unwrap();
    assert_eq!(stock_at(&app, mat.id, WH_MAIN).await, dec!(18));
    assert_eq!(stock_at(&app, mat.id, WH_SOUTH).await, dec!(12));
}

#[tokio::test]
async fn confirm_rental_bumps_catalog_counter() {
    let app = setup().await;
    let mixer = create_rentable_material(&app, "Mixer").await;
    seed_stock(&app, mixer.id, dec!(4)).await;
    let who = actor();

    let created = app
        .ddts
        .create(CreateDdtRequest {
            ddt_type: DdtType::Rental,
            ddt_number: None,
            ddt_date: None,
            carrier_name: None,
            tracking_number: None,
            from_warehouse_id: Some(WH_MAIN),
            to_warehouse_id: None,
            site_id: Some(SITE),
            supplier_id: None,
            customer_id: None,
            notes: None,
            items: vec![DdtItemInput {
                material_id: mixer.id,
                quantity: dec!(2),
                unit_cost: None,
            }],
            actor_id: who,
        })
        .await
        .unwrap();

    app.ddts.confirm(created.ddt.id, who).await.unwrap();
    assert_eq!(stock_at(&app, mixer.id, WH_MAIN).await, dec!(2));
    let mat = app.materials.get(mixer.id).await.unwrap();
    assert_eq!(mat.quantity_out_on_rental, dec!(2));
}

#[tokio::test]
async fn cancel_is_terminal_and_compensates_nothing_when_unconfirmed() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    seed_stock(&app, mat.id, dec!(20)).await;
    let who = actor();

    let created = app.ddts.create(outbound_request(mat.id, dec!(5))).await.unwrap();
    let cancelled = app
        .ddts
        .cancel(created.ddt.id, Some("duplicate entry".into()), who)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(cancelled.notes.as_deref(), Some("duplicate entry"));

    // nothing ever moved, so the journal stays empty apart from the intake
    assert_eq!(stock_at(&app, mat.id, WH_MAIN).await, dec!(20));
    assert_matches!(
        app.ddts.confirm(created.ddt.id, who).await.unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
}

#[tokio::test]
async fn confirm_multiple_reports_per_document_outcomes() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    seed_stock(&app, mat.id, dec!(30)).await;
    let who = actor();

    let good = app.ddts.create(outbound_request(mat.id, dec!(10))).await.unwrap();
    let starved = app.ddts.create(outbound_request(mat.id, dec!(500))).await.unwrap();

    let outcomes = app
        .ddts
        .confirm_multiple(vec![good.ddt.id, starved.ddt.id, 99_999], who)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].code, Some(good.ddt.code.clone()));
    assert!(!outcomes[1].success);
    assert!(outcomes[1].error.as_deref().unwrap().contains("Insufficient stock"));
    assert!(!outcomes[2].success);

    // the failing documents did not block the good one
    assert_eq!(stock_at(&app, mat.id, WH_MAIN).await, dec!(20));
}

#[tokio::test]
async fn open_document_lookup_matches_site_and_material() {
    let app = setup().await;
    let mat = create_material(&app, "Cement", dec!(4.00)).await;
    let other = create_material(&app, "Sand", dec!(0.60)).await;
    seed_stock(&app, mat.id, dec!(50)).await;
    let who = actor();

    let created = app.ddts.create(outbound_request(mat.id, dec!(10))).await.unwrap();

    let hit = app
        .ddts
        .find_open_for_site_material(SITE, mat.id)
        .await
        .unwrap();
    assert_eq!(hit.map(|d| d.id), Some(created.ddt.id));

    assert!(app
        .ddts
        .find_open_for_site_material(SITE, other.id)
        .await
        .unwrap()
        .is_none());
    assert!(app
        .ddts
        .find_open_for_site_material(SITE + 1, mat.id)
        .await
        .unwrap()
        .is_none());

    // once delivered the document no longer counts as open
    app.ddts.confirm(created.ddt.id, who).await.unwrap();
    assert!(app
        .ddts
        .find_open_for_site_material(SITE, mat.id)
        .await
        .unwrap()
        .is_none());
}

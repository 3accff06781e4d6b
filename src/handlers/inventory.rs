use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::{
    errors::ServiceError,
    handlers::actor_id,
    services::inventory::{AdjustRequest, InventoryFilter},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub material_id: Option<i64>,
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WarehouseQuery {
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustBody {
    pub material_id: i64,
    pub warehouse_id: i64,
    /// Signed delta; positive for stock found, negative for shrinkage.
    pub quantity_change: Decimal,
    pub unit_cost: Option<Decimal>,
    #[validate(length(min = 1, message = "an adjustment requires a reason"))]
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockLevelBody {
    pub material_id: i64,
    pub warehouse_id: i64,
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ReservationBody {
    pub material_id: i64,
    pub warehouse_id: i64,
    pub quantity: Decimal,
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_inventory))
        .route("/low-stock", get(low_stock))
        .route("/valuation", get(valuation))
        .route("/adjust", post(adjust))
        .route("/reserve", post(reserve))
        .route("/release", post(release))
        .route("/minimum-stock", put(set_minimum_stock))
        .route("/maximum-stock", put(set_maximum_stock))
}

async fn list_inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .inventory_service
        .get_inventory(InventoryFilter {
            material_id: query.material_id,
            warehouse_id: query.warehouse_id,
        })
        .await?;
    Ok(Json(ApiResponse::ok(rows)))
}

async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<WarehouseQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .inventory_service
        .get_low_stock(query.warehouse_id)
        .await?;
    Ok(Json(ApiResponse::ok(rows)))
}

async fn valuation(
    State(state): State<AppState>,
    Query(query): Query<WarehouseQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state
        .inventory_service
        .get_valuation(query.warehouse_id)
        .await?;
    Ok(Json(ApiResponse::ok(report)))
}

async fn adjust(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(body): Json<AdjustBody>,
) -> Result<impl IntoResponse, ServiceError> {
    body.validate()?;
    let actor = actor_id(&headers)?;
    let outcome = state
        .inventory_service
        .adjust(AdjustRequest {
            material_id: body.material_id,
            warehouse_id: body.warehouse_id,
            quantity_change: body.quantity_change,
            unit_cost: body.unit_cost,
            reason: body.reason,
            notes: body.notes,
            actor_id: actor,
        })
        .await?;
    Ok(Json(ApiResponse::ok(outcome.inventory)))
}

async fn reserve(
    State(state): State<AppState>,
    Json(body): Json<ReservationBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state
        .inventory_service
        .reserve_for_site(body.material_id, body.warehouse_id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn release(
    State(state): State<AppState>,
    Json(body): Json<ReservationBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state
        .inventory_service
        .release_reservation(body.material_id, body.warehouse_id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn set_minimum_stock(
    State(state): State<AppState>,
    Json(body): Json<StockLevelBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state
        .inventory_service
        .update_minimum_stock(body.material_id, body.warehouse_id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn set_maximum_stock(
    State(state): State<AppState>,
    Json(body): Json<StockLevelBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state
        .inventory_service
        .update_maximum_stock(body.material_id, body.warehouse_id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

use axum::{
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::{
    entities::stock_movement::MovementType,
    errors::ServiceError,
    handlers::actor_id,
    services::inventory::{IntakeRequest, MovementHistoryFilter, OutputRequest, TransferRequest},
    ApiResponse, AppState, Paginated,
};

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub material_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub movement_type: Option<String>,
    pub ddt_id: Option<i64>,
    pub site_id: Option<i64>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct IntakeBody {
    pub material_id: i64,
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub supplier_id: Option<i64>,
    pub supplier_document: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OutputBody {
    pub material_id: i64,
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub reference_document: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub material_id: i64,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReverseBody {
    #[validate(length(min = 1, message = "a reversal requires a reason"))]
    pub reason: String,
}

pub fn stock_movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_movements))
        .route("/intake", post(intake))
        .route("/output", post(output))
        .route("/transfer", post(transfer))
        .route("/:id/reverse", post(reverse))
}

async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let movement_type = match query.movement_type.as_deref() {
        Some(raw) => Some(MovementType::from_str(raw).ok_or_else(|| {
            ServiceError::ValidationError(format!("unknown movement type {}", raw))
        })?),
        None => None,
    };

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(50);
    let (rows, total) = state
        .inventory_service
        .get_movement_history(
            MovementHistoryFilter {
                material_id: query.material_id,
                warehouse_id: query.warehouse_id,
                movement_type,
                ddt_id: query.ddt_id,
                site_id: query.site_id,
                from_date: query.from_date,
                to_date: query.to_date,
            },
            page,
            per_page,
        )
        .await?;

    Ok(Json(ApiResponse::ok(Paginated {
        items: rows,
        total,
        page,
        per_page,
    })))
}

async fn intake(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<IntakeBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let outcome = state
        .inventory_service
        .intake(IntakeRequest {
            material_id: body.material_id,
            warehouse_id: body.warehouse_id,
            quantity: body.quantity,
            unit_cost: body.unit_cost,
            supplier_id: body.supplier_id,
            supplier_document: body.supplier_document,
            notes: body.notes,
            actor_id: actor,
        })
        .await?;
    Ok(Json(ApiResponse::ok(outcome.movement)))
}

async fn output(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OutputBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let outcome = state
        .inventory_service
        .output(OutputRequest {
            material_id: body.material_id,
            warehouse_id: body.warehouse_id,
            quantity: body.quantity,
            reference_document: body.reference_document,
            notes: body.notes,
            actor_id: actor,
        })
        .await?;
    Ok(Json(ApiResponse::ok(outcome.movement)))
}

async fn transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TransferBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let (_, _, movement) = state
        .inventory_service
        .transfer(TransferRequest {
            material_id: body.material_id,
            from_warehouse_id: body.from_warehouse_id,
            to_warehouse_id: body.to_warehouse_id,
            quantity: body.quantity,
            notes: body.notes,
            actor_id: actor,
        })
        .await?;
    Ok(Json(ApiResponse::ok(movement)))
}

async fn reverse(
    State(state): State<AppState>,
    Path(movement_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<ReverseBody>,
) -> Result<impl IntoResponse, ServiceError> {
    body.validate()?;
    let actor = actor_id(&headers)?;
    let outcome = state
        .inventory_service
        .reverse_movement(movement_id, body.reason, actor)
        .await?;
    Ok(Json(ApiResponse::ok(outcome.movement)))
}

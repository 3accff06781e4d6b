use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::actor_id,
    services::site_material::{
        CreateSiteMaterialRequest, DeliverRequest, ReserveRequest, ReturnRequest,
        TransferToSiteRequest, UpdateSiteMaterialRequest,
    },
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub material_id: i64,
    pub quote_item_id: Option<i64>,
    pub planned_quantity: Decimal,
    pub planned_unit_cost: Option<Decimal>,
    pub extra_reason: Option<String>,
    pub required_date: Option<DateTime<Utc>>,
    pub requested_by: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub planned_quantity: Option<Decimal>,
    pub required_date: Option<DateTime<Utc>>,
    pub extra_reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveBody {
    pub warehouse_id: i64,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct DeliverBody {
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageBody {
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnBody {
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub to_site_id: i64,
    pub quantity: Decimal,
    pub reason: Option<String>,
}

pub fn site_material_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_for_site).post(create))
        .route("/extras", get(list_extras))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/reserve", post(reserve))
        .route("/:id/deliver", post(deliver))
        .route("/:id/usage", post(log_usage))
        .route("/:id/return", post(return_material))
        .route("/:id/transfer", post(transfer_to_site))
}

async fn list_for_site(
    State(state): State<AppState>,
    Path(site_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state.site_material_service.list_for_site(site_id).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

async fn list_extras(
    State(state): State<AppState>,
    Path(site_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.site_material_service.list_extras(site_id).await?;
    Ok(Json(ApiResponse::ok(summary)))
}

async fn create(
    State(state): State<AppState>,
    Path(site_id): Path<i64>,
    Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state
        .site_material_service
        .create(CreateSiteMaterialRequest {
            site_id,
            material_id: body.material_id,
            quote_item_id: body.quote_item_id,
            planned_quantity: body.planned_quantity,
            planned_unit_cost: body.planned_unit_cost,
            extra_reason: body.extra_reason,
            required_date: body.required_date,
            requested_by: body.requested_by,
            notes: body.notes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(row))))
}

async fn get_one(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state.site_material_service.get(site_id, id).await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn update(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
    Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state
        .site_material_service
        .update(
            site_id,
            id,
            UpdateSiteMaterialRequest {
                planned_quantity: body.planned_quantity,
                required_date: body.required_date,
                extra_reason: body.extra_reason,
                notes: body.notes,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn remove(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ServiceError> {
    state.site_material_service.delete(site_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reserve(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
    headers: HeaderMap,
    Json(body): Json<ReserveBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let row = state
        .site_material_service
        .reserve(
            site_id,
            id,
            ReserveRequest {
                warehouse_id: body.warehouse_id,
                quantity: body.quantity,
                actor_id: actor,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn deliver(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
    headers: HeaderMap,
    Json(body): Json<DeliverBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let row = state
        .site_material_service
        .deliver(
            site_id,
            id,
            DeliverRequest {
                warehouse_id: body.warehouse_id,
                quantity: body.quantity,
                notes: body.notes,
                actor_id: actor,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn log_usage(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
    Json(body): Json<UsageBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let row = state
        .site_material_service
        .log_usage(site_id, id, body.quantity, body.notes)
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn return_material(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
    headers: HeaderMap,
    Json(body): Json<ReturnBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let row = state
        .site_material_service
        .return_material(
            site_id,
            id,
            ReturnRequest {
                warehouse_id: body.warehouse_id,
                quantity: body.quantity,
                notes: body.notes,
                actor_id: actor,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn transfer_to_site(
    State(state): State<AppState>,
    Path((site_id, id)): Path<(i64, i64)>,
    headers: HeaderMap,
    Json(body): Json<TransferBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let (source, destination) = state
        .site_material_service
        .transfer_to_site(
            site_id,
            id,
            TransferToSiteRequest {
                to_site_id: body.to_site_id,
                quantity: body.quantity,
                reason: body.reason,
                actor_id: actor,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({
        "source": source,
        "destination": destination,
    }))))
}

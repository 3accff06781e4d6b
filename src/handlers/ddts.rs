use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    entities::ddt::{DdtStatus, DdtType},
    errors::ServiceError,
    handlers::actor_id,
    services::ddt::{CreateDdtRequest, DdtFilter, DdtItemInput, UpdateDdtRequest},
    ApiResponse, AppState, Paginated,
};

#[derive(Debug, Deserialize)]
pub struct DdtQuery {
    pub status: Option<String>,
    pub ddt_type: Option<String>,
    pub site_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DdtItemBody {
    pub material_id: i64,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDdtBody {
    pub ddt_type: String,
    pub ddt_number: Option<String>,
    pub ddt_date: Option<DateTime<Utc>>,
    pub carrier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub from_warehouse_id: Option<i64>,
    pub to_warehouse_id: Option<i64>,
    pub site_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub notes: Option<String>,
    pub items: Vec<DdtItemBody>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDdtBody {
    pub ddt_number: Option<String>,
    pub ddt_date: Option<DateTime<Utc>>,
    pub carrier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<DdtItemBody>>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmMultipleBody {
    pub ddt_ids: Vec<i64>,
}

pub fn ddt_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ddts).post(create_ddt))
        .route("/confirm-multiple", post(confirm_multiple))
        .route("/:id", get(get_ddt).put(update_ddt))
        .route("/:id/confirm", post(confirm_ddt))
        .route("/:id/mark-delivered", post(mark_delivered))
        .route("/:id/in-transit", post(mark_in_transit))
        .route("/:id/cancel", post(cancel_ddt))
}

fn items_from(body: Vec<DdtItemBody>) -> Vec<DdtItemInput> {
    body.into_iter()
        .map(|item| DdtItemInput {
            material_id: item.material_id,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
        })
        .collect()
}

async fn list_ddts(
    State(state): State<AppState>,
    Query(query): Query<DdtQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(DdtStatus::from_str(raw).ok_or_else(|| {
            ServiceError::ValidationError(format!("unknown DDT status {}", raw))
        })?),
        None => None,
    };
    let ddt_type = match query.ddt_type.as_deref() {
        Some(raw) => Some(DdtType::from_str(raw).ok_or_else(|| {
            ServiceError::ValidationError(format!("unknown DDT type {}", raw))
        })?),
        None => None,
    };

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(50);
    let (rows, total) = state
        .ddt_service
        .get_all(
            DdtFilter {
                status,
                ddt_type,
                site_id: query.site_id,
                warehouse_id: query.warehouse_id,
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

async fn create_ddt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateDdtBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let ddt_type = DdtType::from_str(&body.ddt_type).ok_or_else(|| {
        ServiceError::ValidationError(format!("unknown DDT type {}", body.ddt_type))
    })?;

    let created = state
        .ddt_service
        .create(CreateDdtRequest {
            ddt_type,
            ddt_number: body.ddt_number,
            ddt_date: body.ddt_date,
            carrier_name: body.carrier_name,
            tracking_number: body.tracking_number,
            from_warehouse_id: body.from_warehouse_id,
            to_warehouse_id: body.to_warehouse_id,
            site_id: body.site_id,
            supplier_id: body.supplier_id,
            customer_id: body.customer_id,
            notes: body.notes,
            items: items_from(body.items),
            actor_id: actor,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

async fn get_ddt(
    State(state): State<AppState>,
    Path(ddt_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.ddt_service.get_by_id(ddt_id).await?;
    Ok(Json(ApiResponse::ok(found)))
}

async fn update_ddt(
    State(state): State<AppState>,
    Path(ddt_id): Path<i64>,
    Json(body): Json<UpdateDdtBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .ddt_service
        .update(
            ddt_id,
            UpdateDdtRequest {
                ddt_number: body.ddt_number,
                ddt_date: body.ddt_date,
                carrier_name: body.carrier_name,
                tracking_number: body.tracking_number,
                notes: body.notes,
                items: body.items.map(items_from),
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(updated)))
}

async fn confirm_ddt(
    State(state): State<AppState>,
    Path(ddt_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let outcome = state.ddt_service.confirm(ddt_id, actor).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({
        "ddt": outcome.ddt,
        "movements": outcome.movements,
    }))))
}

async fn mark_delivered(
    State(state): State<AppState>,
    Path(ddt_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let outcome = state.ddt_service.mark_delivered(ddt_id, actor).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({
        "ddt": outcome.ddt,
        "movements": outcome.movements,
    }))))
}

async fn mark_in_transit(
    State(state): State<AppState>,
    Path(ddt_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.ddt_service.mark_in_transit(ddt_id).await?;
    Ok(Json(ApiResponse::ok(updated)))
}

async fn cancel_ddt(
    State(state): State<AppState>,
    Path(ddt_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<CancelBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor_id(&headers)?;
    let updated = state.ddt_service.cancel(ddt_id, body.reason, actor).await?;
    Ok(Json(ApiResponse::ok(updated)))
}

async fn confirm_multiple(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ConfirmMultipleBody>,
) -> Result<impl IntoResponse, ServiceError> {
    if body.ddt_ids.is_empty() {
        return Err(ServiceError::ValidationError(
            "ddt_ids must not be empty".into(),
        ));
    }
    let actor = actor_id(&headers)?;
    let outcomes = state
        .ddt_service
        .confirm_multiple(body.ddt_ids, actor)
        .await?;
    Ok(Json(ApiResponse::ok(outcomes)))
}

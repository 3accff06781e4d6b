use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::{
    errors::ServiceError, services::materials::CreateMaterialRequest, ApiResponse, AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialBody {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "unit must not be empty"))]
    pub unit: String,
    pub standard_cost: Decimal,
    #[serde(default)]
    pub is_rentable: bool,
    pub rental_price_daily: Option<Decimal>,
}

pub fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route("/:id", get(get_material))
}

async fn list_materials(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let rows = state.material_service.list().await?;
    Ok(Json(ApiResponse::ok(rows)))
}

async fn create_material(
    State(state): State<AppState>,
    Json(body): Json<CreateMaterialBody>,
) -> Result<impl IntoResponse, ServiceError> {
    body.validate()?;
    let created = state
        .material_service
        .create(CreateMaterialRequest {
            name: body.name,
            unit: body.unit,
            standard_cost: body.standard_cost,
            is_rentable: body.is_rentable,
            rental_price_daily: body.rental_price_daily,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

async fn get_material(
    State(state): State<AppState>,
    Path(material_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.material_service.get(material_id).await?;
    Ok(Json(ApiResponse::ok(found)))
}

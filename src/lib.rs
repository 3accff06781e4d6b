use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use services::{DdtService, InventoryService, MaterialCatalogService, SiteMaterialService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub inventory_service: Arc<InventoryService>,
    pub ddt_service: Arc<DdtService>,
    pub site_material_service: Arc<SiteMaterialService>,
    pub material_service: Arc<MaterialCatalogService>,
}

/// Standard success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Builds the full API router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/inventory", handlers::inventory::inventory_routes())
        .nest(
            "/api/v1/stock-movements",
            handlers::stock_movements::stock_movement_routes(),
        )
        .nest("/api/v1/materials", handlers::materials::material_routes())
        .nest("/api/v1/ddts", handlers::ddts::ddt_routes())
        .nest(
            "/api/v1/sites/:site_id/materials",
            handlers::site_materials::site_material_routes(),
        )
        .with_state(state)
}

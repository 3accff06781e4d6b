use crate::{
    db::DbPool,
    entities::material::{self, Entity as Material},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{Set, *};
use std::sync::Arc;
use tracing::instrument;

/// Bumps the catalog's out-on-rental counter. Callers hold the surrounding
/// transaction; this only guards the catalog-side rules.
pub(crate) async fn rent_out<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    quantity: Decimal,
) -> Result<material::Model, ServiceError> {
    let mat = Material::find_by_id(material_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("material {}", material_id)))?;

    if !mat.is_rentable {
        return Err(ServiceError::NotRentable(format!(
            "material {} ({})",
            mat.id, mat.name
        )));
    }

    let mut active: material::ActiveModel = mat.clone().into();
    active.quantity_out_on_rental = Set(mat.quantity_out_on_rental + quantity);
    active.update(db).await.map_err(ServiceError::db_error)
}

pub(crate) async fn rent_return<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    quantity: Decimal,
) -> Result<material::Model, ServiceError> {
    let mat = Material::find_by_id(material_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("material {}", material_id)))?;

    if mat.quantity_out_on_rental < quantity {
        return Err(ServiceError::ValidationError(format!(
            "material {}: returning {} but only {} is out on rental",
            mat.id, quantity, mat.quantity_out_on_rental
        )));
    }

    let mut active: material::ActiveModel = mat.clone().into();
    active.quantity_out_on_rental = Set(mat.quantity_out_on_rental - quantity);
    active.update(db).await.map_err(ServiceError::db_error)
}

#[derive(Debug, Clone)]
pub struct CreateMaterialRequest {
    pub name: String,
    pub unit: String,
    pub standard_cost: Decimal,
    pub is_rentable: bool,
    pub rental_price_daily: Option<Decimal>,
}

pub struct MaterialCatalogService {
    db_pool: Arc<DbPool>,
}

impl MaterialCatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        req: CreateMaterialRequest,
    ) -> Result<material::Model, ServiceError> {
        if req.name.trim().is_empty() {
            return Err(ServiceError::ValidationError("name must not be empty".into()));
        }
        if req.standard_cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "standard_cost must not be negative".into(),
            ));
        }

        material::ActiveModel {
            name: Set(req.name),
            unit: Set(req.unit),
            standard_cost: Set(req.standard_cost),
            is_rentable: Set(req.is_rentable),
            quantity_out_on_rental: Set(Decimal::ZERO),
            rental_price_daily: Set(req.rental_price_daily),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)
    }

    pub async fn get(&self, material_id: i64) -> Result<material::Model, ServiceError> {
        Material::find_by_id(material_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("material {}", material_id)))
    }

    pub async fn list(&self) -> Result<Vec<material::Model>, ServiceError> {
        Material::find()
            .order_by_asc(material::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}

use crate::{
    db::DbPool,
    entities::{
        material::Entity as Material,
        site_material::{self, derive_status, Entity as SiteMaterial, SiteMaterialStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{ddt, ensure_positive, inventory, tx_err},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, *};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateSiteMaterialRequest {
    pub site_id: i64,
    pub material_id: i64,
    pub quote_item_id: Option<i64>,
    pub planned_quantity: Decimal,
    pub planned_unit_cost: Option<Decimal>,
    pub extra_reason: Option<String>,
    pub required_date: Option<DateTime<Utc>>,
    pub requested_by: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSiteMaterialRequest {
    pub planned_quantity: Option<Decimal>,
    pub required_date: Option<DateTime<Utc>>,
    pub extra_reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct DeliverRequest {
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ReturnRequest {
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TransferToSiteRequest {
    pub to_site_id: i64,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtrasSummary {
    pub extras: Vec<site_material::Model>,
    pub total_extra_cost: Decimal,
}

async fn load_owned<C: ConnectionTrait>(
    db: &C,
    site_id: i64,
    site_material_id: i64,
) -> Result<site_material::Model, ServiceError> {
    let row = SiteMaterial::find_by_id(site_material_id)
        .filter(site_material::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("site material {}", site_material_id)))?;

    if row.site_id != site_id {
        return Err(ServiceError::OwnershipMismatch(format!(
            "site material {} does not belong to site {}",
            site_material_id, site_id
        )));
    }
    Ok(row)
}

pub struct SiteMaterialService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SiteMaterialService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn publish_updated(&self, row: &site_material::Model) {
        if let Err(e) = self
            .event_sender
            .send(Event::SiteMaterialUpdated {
                site_material_id: row.id,
                site_id: row.site_id,
                status: row.status.clone(),
            })
            .await
        {
            warn!(site_material_id = row.id, error = %e, "dropped site material event");
        }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        req: CreateSiteMaterialRequest,
    ) -> Result<site_material::Model, ServiceError> {
        ensure_positive(req.planned_quantity, "planned_quantity")?;

        let mat = Material::find_by_id(req.material_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("material {}", req.material_id)))?;

        // A record with no quote line behind it is an extra by definition.
        let is_extra = req.quote_item_id.is_none();
        let cost = req.planned_unit_cost.unwrap_or(mat.standard_cost);

        let row = site_material::ActiveModel {
            site_id: Set(req.site_id),
            material_id: Set(req.material_id),
            quote_item_id: Set(req.quote_item_id),
            is_extra: Set(is_extra),
            extra_reason: Set(req.extra_reason.filter(|_| is_extra)),
            requested_by: Set(req.requested_by),
            requested_at: Set(req.requested_by.map(|_| Utc::now())),
            planned_quantity: Set(req.planned_quantity),
            allocated_quantity: Set(Decimal::ZERO),
            delivered_quantity: Set(Decimal::ZERO),
            used_quantity: Set(Decimal::ZERO),
            returned_quantity: Set(Decimal::ZERO),
            planned_unit_cost: Set(cost),
            actual_unit_cost: Set(cost),
            status: Set(SiteMaterialStatus::Planned.as_str().to_string()),
            required_date: Set(req.required_date),
            notes: Set(req.notes),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::SiteMaterialCreated {
                site_material_id: row.id,
                site_id: row.site_id,
                is_extra: row.is_extra,
            })
            .await
        {
            warn!(site_material_id = row.id, error = %e, "dropped site material event");
        }
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        site_id: i64,
        site_material_id: i64,
        req: UpdateSiteMaterialRequest,
    ) -> Result<site_material::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let row = load_owned(db, site_id, site_material_id).await?;

        if let Some(planned) = req.planned_quantity {
            ensure_positive(planned, "planned_quantity")?;
            if planned < row.delivered_quantity {
                return Err(ServiceError::ValidationError(format!(
                    "planned quantity {} cannot drop below delivered quantity {}",
                    planned, row.delivered_quantity
                )));
            }
        }

        let delivered = row.delivered_quantity;
        let returned = row.returned_quantity;
        let mut active: site_material::ActiveModel = row.into();
        if let Some(planned) = req.planned_quantity {
            active.planned_quantity = Set(planned);
            active.status = Set(derive_status(planned, delivered, returned)
                .as_str()
                .to_string());
        }
        if let Some(v) = req.required_date {
            active.required_date = Set(Some(v));
        }
        if let Some(v) = req.extra_reason {
            active.extra_reason = Set(Some(v));
        }
        if let Some(v) = req.notes {
            active.notes = Set(Some(v));
        }

        let updated = active.update(db).await.map_err(ServiceError::db_error)?;
        self.publish_updated(&updated).await;
        Ok(updated)
    }

    /// Earmarks warehouse stock for this site line. The ledger reservation
    /// and the allocated counter move together.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        site_id: i64,
        site_material_id: i64,
        req: ReserveRequest,
    ) -> Result<site_material::Model, ServiceError> {
        ensure_positive(req.quantity, "quantity")?;

        let updated = self
            .db_pool
            .transaction::<_, site_material::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = load_owned(txn, site_id, site_material_id).await?;

                    inventory::apply_reserve(txn, row.material_id, req.warehouse_id, req.quantity)
                        .await?;

                    let derived =
                        derive_status(row.planned_quantity, row.delivered_quantity, row.returned_quantity);
                    let status = if derived == SiteMaterialStatus::Planned {
                        SiteMaterialStatus::Reserved
                    } else {
                        derived
                    };

                    let allocated = row.allocated_quantity + req.quantity;
                    let mut active: site_material::ActiveModel = row.into();
                    active.allocated_quantity = Set(allocated);
                    active.status = Set(status.as_str().to_string());
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_updated(&updated).await;
        Ok(updated)
    }

    /// Direct delivery from warehouse to site. Refused while an open outbound
    /// DDT already covers the same site and material; that document owns the
    /// delivery.
    #[instrument(skip(self))]
    pub async fn deliver(
        &self,
        site_id: i64,
        site_material_id: i64,
        req: DeliverRequest,
    ) -> Result<site_material::Model, ServiceError> {
        ensure_positive(req.quantity, "quantity")?;

        let (updated, ledger) = self
            .db_pool
            .transaction::<_, (site_material::Model, inventory::LedgerOutcome), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let row = load_owned(txn, site_id, site_material_id).await?;

                        if let Some(open) =
                            ddt::find_open_for_site_material(txn, site_id, row.material_id).await?
                        {
                            return Err(ServiceError::ConflictingDocument(format!(
                                "open DDT {} already covers material {} for site {}",
                                open.code, row.material_id, site_id
                            )));
                        }

                        let ledger = inventory::apply_deliver_to_site(
                            txn,
                            row.material_id,
                            req.warehouse_id,
                            site_id,
                            req.quantity,
                            req.actor_id,
                            inventory::MovementMeta {
                                reference_document: Some(format!(
                                    "site material {}",
                                    site_material_id
                                )),
                                notes: req.notes,
                                ..Default::default()
                            },
                        )
                        .await?;

                        let delivered = row.delivered_quantity + req.quantity;
                        let used = (delivered - row.returned_quantity).max(Decimal::ZERO);
                        let status =
                            derive_status(row.planned_quantity, delivered, row.returned_quantity);
                        let allocated =
                            (row.allocated_quantity - req.quantity).max(Decimal::ZERO);

                        let mut active: site_material::ActiveModel = row.into();
                        active.delivered_quantity = Set(delivered);
                        active.used_quantity = Set(used);
                        active.allocated_quantity = Set(allocated);
                        active.status = Set(status.as_str().to_string());
                        active.delivery_date = Set(Some(Utc::now()));
                        let updated =
                            active.update(txn).await.map_err(ServiceError::db_error)?;
                        Ok((updated, ledger))
                    })
                },
            )
            .await
            .map_err(tx_err)?;

        inventory::publish_movement_events(&self.event_sender, &ledger).await;
        self.publish_updated(&updated).await;
        Ok(updated)
    }

    /// Granular consumption log. The delivery paths keep `used` in lockstep
    /// with net delivered; this endpoint lets a site record usage explicitly
    /// instead.
    #[instrument(skip(self))]
    pub async fn log_usage(
        &self,
        site_id: i64,
        site_material_id: i64,
        quantity: Decimal,
        notes: Option<String>,
    ) -> Result<site_material::Model, ServiceError> {
        ensure_positive(quantity, "quantity")?;
        let db = self.db_pool.as_ref();
        let row = load_owned(db, site_id, site_material_id).await?;

        let used = row.used_quantity + quantity;
        if used > row.planned_quantity {
            return Err(ServiceError::ExceedsPlanned(format!(
                "usage {} would exceed planned quantity {}",
                used, row.planned_quantity
            )));
        }

        let status = if used >= row.planned_quantity {
            SiteMaterialStatus::Completed
        } else {
            SiteMaterialStatus::InUse
        };

        let mut active: site_material::ActiveModel = row.into();
        active.used_quantity = Set(used);
        active.status = Set(status.as_str().to_string());
        if let Some(notes) = notes {
            active.notes = Set(Some(notes));
        }
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;
        self.publish_updated(&updated).await;
        Ok(updated)
    }

    /// Sends unused material back to a warehouse.
    #[instrument(skip(self))]
    pub async fn return_material(
        &self,
        site_id: i64,
        site_material_id: i64,
        req: ReturnRequest,
    ) -> Result<site_material::Model, ServiceError> {
        ensure_positive(req.quantity, "quantity")?;

        let (updated, ledger) = self
            .db_pool
            .transaction::<_, (site_material::Model, inventory::LedgerOutcome), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let row = load_owned(txn, site_id, site_material_id).await?;

                        let returned = row.returned_quantity + req.quantity;
                        if returned > row.delivered_quantity {
                            return Err(ServiceError::ExceedsDelivered(format!(
                                "return of {} would exceed delivered quantity {}",
                                returned, row.delivered_quantity
                            )));
                        }

                        let ledger = inventory::apply_return_from_site(
                            txn,
                            row.material_id,
                            req.warehouse_id,
                            site_id,
                            req.quantity,
                            req.actor_id,
                            inventory::MovementMeta {
                                reference_document: Some(format!(
                                    "site material {}",
                                    site_material_id
                                )),
                                notes: req.notes,
                                ..Default::default()
                            },
                        )
                        .await?;

                        let used = (row.delivered_quantity - returned).max(Decimal::ZERO);
                        let status =
                            derive_status(row.planned_quantity, row.delivered_quantity, returned);

                        let mut active: site_material::ActiveModel = row.into();
                        active.returned_quantity = Set(returned);
                        active.used_quantity = Set(used);
                        active.status = Set(status.as_str().to_string());
                        let updated =
                            active.update(txn).await.map_err(ServiceError::db_error)?;
                        Ok((updated, ledger))
                    })
                },
            )
            .await
            .map_err(tx_err)?;

        inventory::publish_movement_events(&self.event_sender, &ledger).await;
        self.publish_updated(&updated).await;
        Ok(updated)
    }

    /// Moves material already on one site to another site. Warehouse counters
    /// are untouched: the stock never re-enters a warehouse.
    #[instrument(skip(self))]
    pub async fn transfer_to_site(
        &self,
        site_id: i64,
        site_material_id: i64,
        req: TransferToSiteRequest,
    ) -> Result<(site_material::Model, site_material::Model), ServiceError> {
        ensure_positive(req.quantity, "quantity")?;
        if req.to_site_id == site_id {
            return Err(ServiceError::ValidationError(
                "source and destination site must differ".into(),
            ));
        }

        let (source, destination) = self
            .db_pool
            .transaction::<_, (site_material::Model, site_material::Model), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let row = load_owned(txn, site_id, site_material_id).await?;

                        let on_site = row.delivered_quantity - row.returned_quantity;
                        if req.quantity > on_site {
                            return Err(ServiceError::ExceedsAvailable(format!(
                                "transfer of {} exceeds the {} on site",
                                req.quantity, on_site
                            )));
                        }

                        let destination = site_material::ActiveModel {
                            site_id: Set(req.to_site_id),
                            material_id: Set(row.material_id),
                            is_extra: Set(true),
                            extra_reason: Set(Some(format!(
                                "transferred from site {}",
                                site_id
                            ))),
                            planned_quantity: Set(req.quantity),
                            allocated_quantity: Set(Decimal::ZERO),
                            delivered_quantity: Set(req.quantity),
                            used_quantity: Set(req.quantity),
                            returned_quantity: Set(Decimal::ZERO),
                            planned_unit_cost: Set(row.actual_unit_cost),
                            actual_unit_cost: Set(row.actual_unit_cost),
                            status: Set(derive_status(
                                req.quantity,
                                req.quantity,
                                Decimal::ZERO,
                            )
                            .as_str()
                            .to_string()),
                            delivery_date: Set(Some(Utc::now())),
                            notes: Set(req.reason.clone()),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        // Bookkeeping on the source: the material left this
                        // site, so it counts as returned here.
                        let returned = row.returned_quantity + req.quantity;
                        let used = (row.delivered_quantity - returned).max(Decimal::ZERO);
                        let status =
                            derive_status(row.planned_quantity, row.delivered_quantity, returned);
                        let note = format!(
                            "transferred {} to site {}",
                            req.quantity, req.to_site_id
                        );
                        let notes = match &row.notes {
                            Some(existing) => format!("{}\n{}", existing, note),
                            None => note,
                        };

                        let mut active: site_material::ActiveModel = row.into();
                        active.returned_quantity = Set(returned);
                        active.used_quantity = Set(used);
                        active.status = Set(status.as_str().to_string());
                        active.notes = Set(Some(notes));
                        let source =
                            active.update(txn).await.map_err(ServiceError::db_error)?;

                        Ok((source, destination))
                    })
                },
            )
            .await
            .map_err(tx_err)?;

        self.publish_updated(&source).await;
        self.publish_updated(&destination).await;
        Ok((source, destination))
    }

    /// Soft delete, allowed only before the record has any stock effects.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        site_id: i64,
        site_material_id: i64,
    ) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let row = load_owned(db, site_id, site_material_id).await?;

        if !row.is_untouched() {
            return Err(ServiceError::InvalidTransition(format!(
                "site material {} has recorded stock effects and cannot be deleted",
                site_material_id
            )));
        }

        let mut active: site_material::ActiveModel = row.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::SiteMaterialDeleted {
                site_material_id,
                site_id,
            })
            .await
        {
            warn!(site_material_id, error = %e, "dropped site material event");
        }
        Ok(())
    }

    pub async fn list_for_site(
        &self,
        site_id: i64,
    ) -> Result<Vec<site_material::Model>, ServiceError> {
        SiteMaterial::find()
            .filter(site_material::Column::SiteId.eq(site_id))
            .filter(site_material::Column::DeletedAt.is_null())
            .order_by_asc(site_material::Column::MaterialId)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn get(
        &self,
        site_id: i64,
        site_material_id: i64,
    ) -> Result<site_material::Model, ServiceError> {
        load_owned(self.db_pool.as_ref(), site_id, site_material_id).await
    }

    pub async fn list_extras(&self, site_id: i64) -> Result<ExtrasSummary, ServiceError> {
        let extras = SiteMaterial::find()
            .filter(site_material::Column::SiteId.eq(site_id))
            .filter(site_material::Column::IsExtra.eq(true))
            .filter(site_material::Column::DeletedAt.is_null())
            .order_by_asc(site_material::Column::Id)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let total_extra_cost = extras.iter().map(|row| row.actual_total_cost()).sum();
        Ok(ExtrasSummary {
            extras,
            total_extra_cost,
        })
    }
}

use crate::{
    db::DbPool,
    entities::{
        ddt::{self, DdtStatus, DdtType, Entity as Ddt},
        ddt_item::{self, Entity as DdtItem},
        material::{self, Entity as Material},
        site_material::{self, derive_status, Entity as SiteMaterial},
        stock_movement::{self, Entity as StockMovement},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{ensure_positive, inventory, tx_err},
};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, *};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DdtItemInput {
    pub material_id: i64,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct CreateDdtRequest {
    pub ddt_type: DdtType,
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
    pub items: Vec<DdtItemInput>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDdtRequest {
    pub ddt_number: Option<String>,
    pub ddt_date: Option<DateTime<Utc>>,
    pub carrier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<DdtItemInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct DdtFilter {
    pub status: Option<DdtStatus>,
    pub ddt_type: Option<DdtType>,
    pub site_id: Option<i64>,
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DdtWithItems {
    pub ddt: ddt::Model,
    pub items: Vec<ddt_item::Model>,
}

#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub ddt: ddt::Model,
    pub movements: Vec<stock_movement::Model>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchConfirmOutcome {
    pub ddt_id: i64,
    pub success: bool,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// `DDT-<year>-<seq>`. Advisory like the movement codes; the unique index on
/// `ddts.code` is the backstop if two writers race the count.
pub(crate) async fn next_ddt_code<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let prefix = format!("DDT-{}-", now.year());
    let this_year = Ddt::find()
        .filter(ddt::Column::Code.starts_with(prefix.as_str()))
        .count(db)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(format!("{}{:04}", prefix, this_year + 1))
}

fn validate_header(req: &CreateDdtRequest) -> Result<(), ServiceError> {
    match req.ddt_type {
        DdtType::Inbound => {
            if req.to_warehouse_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "an inbound DDT requires to_warehouse_id".into(),
                ));
            }
        }
        DdtType::Outbound => {
            if req.from_warehouse_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "an outbound DDT requires from_warehouse_id".into(),
                ));
            }
            if req.site_id.is_none() && req.customer_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "an outbound DDT requires a site or a customer".into(),
                ));
            }
        }
        DdtType::Transfer => {
            match (req.from_warehouse_id, req.to_warehouse_id) {
                (Some(from), Some(to)) if from == to => {
                    return Err(ServiceError::ValidationError(
                        "source and destination warehouse must differ".into(),
                    ));
                }
                (Some(_), Some(_)) => {}
                _ => {
                    return Err(ServiceError::ValidationError(
                        "a transfer DDT requires both warehouses".into(),
                    ));
                }
            }
        }
        DdtType::Rental => {
            if req.from_warehouse_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "a rental DDT requires from_warehouse_id".into(),
                ));
            }
            if req.site_id.is_none() && req.customer_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "a rental DDT requires a site or a customer".into(),
                ));
            }
        }
    }
    Ok(())
}

fn validate_items(items: &[DdtItemInput]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "a DDT requires at least one item".into(),
        ));
    }
    for item in items {
        ensure_positive(item.quantity, "item quantity")?;
    }
    Ok(())
}

/// Folds a confirmed delivery into the site's tracking record. Materials
/// delivered with no plan line become `is_extra` records.
async fn sync_site_material<C: ConnectionTrait>(
    db: &C,
    site_id: i64,
    material_id: i64,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
) -> Result<site_material::Model, ServiceError> {
    let existing = SiteMaterial::find()
        .filter(site_material::Column::SiteId.eq(site_id))
        .filter(site_material::Column::MaterialId.eq(material_id))
        .filter(site_material::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    if let Some(row) = existing {
        let delivered = row.delivered_quantity + quantity;
        let used = (delivered - row.returned_quantity).max(Decimal::ZERO);
        let status = derive_status(row.planned_quantity, delivered, row.returned_quantity);

        let mut active: site_material::ActiveModel = row.clone().into();
        active.delivered_quantity = Set(delivered);
        active.allocated_quantity = Set((row.allocated_quantity - quantity).max(Decimal::ZERO));
        active.used_quantity = Set(used);
        active.status = Set(status.as_str().to_string());
        active.delivery_date = Set(Some(Utc::now()));
        if let Some(cost) = unit_cost {
            active.actual_unit_cost = Set(cost);
        }
        return active.update(db).await.map_err(ServiceError::db_error);
    }

    let mat = Material::find_by_id(material_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("material {}", material_id)))?;
    let cost = unit_cost.unwrap_or(mat.standard_cost);
    let status = derive_status(Decimal::ZERO, quantity, Decimal::ZERO);

    site_material::ActiveModel {
        site_id: Set(site_id),
        material_id: Set(material_id),
        is_extra: Set(true),
        extra_reason: Set(Some("delivered without a plan line".into())),
        planned_quantity: Set(Decimal::ZERO),
        allocated_quantity: Set(Decimal::ZERO),
        delivered_quantity: Set(quantity),
        used_quantity: Set(quantity),
        returned_quantity: Set(Decimal::ZERO),
        planned_unit_cost: Set(cost),
        actual_unit_cost: Set(cost),
        status: Set(status.as_str().to_string()),
        delivery_date: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)
}

pub struct DdtService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DdtService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn publish_status_change(&self, row: &ddt::Model, old_status: &str) {
        if let Err(e) = self
            .event_sender
            .send(Event::DdtStatusChanged {
                ddt_id: row.id,
                code: row.code.clone(),
                old_status: old_status.to_string(),
                new_status: row.status.clone(),
            })
            .await
        {
            warn!(code = %row.code, error = %e, "dropped DDT status event");
        }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, req: CreateDdtRequest) -> Result<DdtWithItems, ServiceError> {
        validate_header(&req)?;
        validate_items(&req.items)?;

        let created = self
            .db_pool
            .transaction::<_, DdtWithItems, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let code = next_ddt_code(txn, now).await?;

                    let header = ddt::ActiveModel {
                        code: Set(code),
                        ddt_type: Set(req.ddt_type.as_str().to_string()),
                        status: Set(DdtStatus::Issued.as_str().to_string()),
                        ddt_number: Set(req.ddt_number),
                        ddt_date: Set(req.ddt_date.unwrap_or(now)),
                        carrier_name: Set(req.carrier_name),
                        tracking_number: Set(req.tracking_number),
                        from_warehouse_id: Set(req.from_warehouse_id),
                        to_warehouse_id: Set(req.to_warehouse_id),
                        site_id: Set(req.site_id),
                        supplier_id: Set(req.supplier_id),
                        customer_id: Set(req.customer_id),
                        created_by: Set(req.actor_id),
                        notes: Set(req.notes),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut items = Vec::with_capacity(req.items.len());
                    for (position, item) in req.items.into_iter().enumerate() {
                        let row = ddt_item::ActiveModel {
                            ddt_id: Set(header.id),
                            material_id: Set(item.material_id),
                            quantity: Set(item.quantity),
                            unit_cost: Set(item.unit_cost),
                            position: Set(position as i32 + 1),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                        items.push(row);
                    }

                    Ok(DdtWithItems { ddt: header, items })
                })
            })
            .await
            .map_err(tx_err)?;

        info!(code = %created.ddt.code, "DDT created");
        if let Err(e) = self
            .event_sender
            .send(Event::DdtCreated {
                ddt_id: created.ddt.id,
                code: created.ddt.code.clone(),
            })
            .await
        {
            warn!(code = %created.ddt.code, error = %e, "dropped DDT created event");
        }
        Ok(created)
    }

    /// Header fields and items can change only while the document is open.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        ddt_id: i64,
        req: UpdateDdtRequest,
    ) -> Result<DdtWithItems, ServiceError> {
        if let Some(items) = &req.items {
            validate_items(items)?;
        }

        self.db_pool
            .transaction::<_, DdtWithItems, ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = load_ddt(txn, ddt_id).await?;
                    let status = parse_status(&row)?;
                    if !status.is_open() {
                        return Err(ServiceError::InvalidTransition(format!(
                            "DDT {} is {} and can no longer be edited",
                            row.code, row.status
                        )));
                    }

                    let mut active: ddt::ActiveModel = row.into();
                    if let Some(v) = req.ddt_number {
                        active.ddt_number = Set(Some(v));
                    }
                    if let Some(v) = req.ddt_date {
                        active.ddt_date = Set(v);
                    }
                    if let Some(v) = req.carrier_name {
                        active.carrier_name = Set(Some(v));
                    }
                    if let Some(v) = req.tracking_number {
                        active.tracking_number = Set(Some(v));
                    }
                    if let Some(v) = req.notes {
                        active.notes = Set(Some(v));
                    }
                    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                    if let Some(items) = req.items {
                        DdtItem::delete_many()
                            .filter(ddt_item::Column::DdtId.eq(ddt_id))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        for (position, item) in items.into_iter().enumerate() {
                            ddt_item::ActiveModel {
                                ddt_id: Set(ddt_id),
                                material_id: Set(item.material_id),
                                quantity: Set(item.quantity),
                                unit_cost: Set(item.unit_cost),
                                position: Set(position as i32 + 1),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        }
                    }

                    let items = DdtItem::find()
                        .filter(ddt_item::Column::DdtId.eq(ddt_id))
                        .order_by_asc(ddt_item::Column::Position)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    Ok(DdtWithItems { ddt: updated, items })
                })
            })
            .await
            .map_err(tx_err)
    }

    #[instrument(skip(self))]
    pub async fn mark_in_transit(&self, ddt_id: i64) -> Result<ddt::Model, ServiceError> {
        let updated = self
            .db_pool
            .transaction::<_, ddt::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = load_ddt(txn, ddt_id).await?;
                    let status = parse_status(&row)?;
                    if status != DdtStatus::Issued {
                        return Err(ServiceError::InvalidTransition(format!(
                            "DDT {} is {}, only issued documents can go in transit",
                            row.code, row.status
                        )));
                    }

                    let mut active: ddt::ActiveModel = row.into();
                    active.status = Set(DdtStatus::InTransit.as_str().to_string());
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_status_change(&updated, DdtStatus::Issued.as_str())
            .await;
        Ok(updated)
    }

    /// Confirms delivery: the document moves to `delivered` and the stock
    /// effects of its items land in the ledger, all in one transaction.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        ddt_id: i64,
        actor_id: Uuid,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let (outcome, old_status) = self
            .db_pool
            .transaction::<_, (ConfirmOutcome, String), ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = load_ddt(txn, ddt_id).await?;
                    let old_status = parse_status(&row)?;
                    if !old_status.is_open() {
                        return Err(ServiceError::InvalidTransition(format!(
                            "DDT {} is {} and cannot be confirmed",
                            row.code, row.status
                        )));
                    }
                    let ddt_type = row.ddt_type().ok_or_else(|| {
                        ServiceError::InternalError(format!("unknown DDT type {}", row.ddt_type))
                    })?;

                    let items = DdtItem::find()
                        .filter(ddt_item::Column::DdtId.eq(ddt_id))
                        .order_by_asc(ddt_item::Column::Position)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    if items.is_empty() {
                        return Err(ServiceError::ValidationError(format!(
                            "DDT {} has no items",
                            row.code
                        )));
                    }

                    let source_warehouse = if matches!(
                        ddt_type,
                        DdtType::Outbound | DdtType::Transfer | DdtType::Rental
                    ) {
                        let from = row.from_warehouse_id.ok_or_else(|| {
                            ServiceError::ValidationError(format!(
                                "DDT {} has no source warehouse",
                                row.code
                            ))
                        })?;
                        precheck_source_stock(txn, from, &items, ddt_type).await?;
                        Some(from)
                    } else {
                        None
                    };
                    let destination_warehouse = if matches!(
                        ddt_type,
                        DdtType::Inbound | DdtType::Transfer
                    ) {
                        Some(row.to_warehouse_id.ok_or_else(|| {
                            ServiceError::ValidationError(format!(
                                "DDT {} has no destination warehouse",
                                row.code
                            ))
                        })?)
                    } else {
                        None
                    };

                    let mut movements = Vec::with_capacity(items.len());
                    for item in &items {
                        let meta = inventory::MovementMeta {
                            ddt_id: Some(row.id),
                            site_id: row.site_id,
                            supplier_id: row.supplier_id,
                            supplier_document: row.ddt_number.clone(),
                            reference_document: Some(row.code.clone()),
                            unit_cost: item.unit_cost,
                            notes: None,
                        };
                        match ddt_type {
                            DdtType::Inbound => {
                                let to = destination_warehouse
                                    .ok_or_else(|| missing_warehouse(&row.code))?;
                                let out = inventory::apply_intake(
                                    txn,
                                    item.material_id,
                                    to,
                                    item.quantity,
                                    actor_id,
                                    meta,
                                )
                                .await?;
                                movements.push(out.movement);
                            }
                            DdtType::Outbound => {
                                let from = source_warehouse
                                    .ok_or_else(|| missing_warehouse(&row.code))?;
                                if let Some(site_id) = row.site_id {
                                    let out = inventory::apply_deliver_to_site(
                                        txn,
                                        item.material_id,
                                        from,
                                        site_id,
                                        item.quantity,
                                        actor_id,
                                        meta,
                                    )
                                    .await?;
                                    movements.push(out.movement);
                                    sync_site_material(
                                        txn,
                                        site_id,
                                        item.material_id,
                                        item.quantity,
                                        item.unit_cost,
                                    )
                                    .await?;
                                } else {
                                    let out = inventory::apply_output(
                                        txn,
                                        item.material_id,
                                        from,
                                        item.quantity,
                                        actor_id,
                                        meta,
                                    )
                                    .await?;
                                    movements.push(out.movement);
                                }
                            }
                            DdtType::Transfer => {
                                let from = source_warehouse
                                    .ok_or_else(|| missing_warehouse(&row.code))?;
                                let to = destination_warehouse
                                    .ok_or_else(|| missing_warehouse(&row.code))?;
                                let (_, _, movement) = inventory::apply_transfer(
                                    txn,
                                    item.material_id,
                                    from,
                                    to,
                                    item.quantity,
                                    actor_id,
                                    meta,
                                )
                                .await?;
                                movements.push(movement);
                            }
                            DdtType::Rental => {
                                let from = source_warehouse
                                    .ok_or_else(|| missing_warehouse(&row.code))?;
                                let out = inventory::apply_rental_out(
                                    txn,
                                    item.material_id,
                                    from,
                                    item.quantity,
                                    actor_id,
                                    meta,
                                )
                                .await?;
                                movements.push(out.movement);
                            }
                        }
                    }

                    let previous = row.status.clone();
                    let mut active: ddt::ActiveModel = row.into();
                    active.status = Set(DdtStatus::Delivered.as_str().to_string());
                    active.delivered_at = Set(Some(Utc::now()));
                    let confirmed = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok((
                        ConfirmOutcome {
                            ddt: confirmed,
                            movements,
                        },
                        previous,
                    ))
                })
            })
            .await
            .map_err(tx_err)?;

        info!(code = %outcome.ddt.code, movements = outcome.movements.len(), "DDT confirmed");
        self.publish_status_change(&outcome.ddt, &old_status).await;
        Ok(outcome)
    }

    /// Carrier-facing alias for `confirm`: a document reported delivered gets
    /// the same stock effects and the same transition checks.
    #[instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        ddt_id: i64,
        actor_id: Uuid,
    ) -> Result<ConfirmOutcome, ServiceError> {
        self.confirm(ddt_id, actor_id).await
    }

    /// Terminal. Any movements already journaled against the document are
    /// compensated, never deleted.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        ddt_id: i64,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<ddt::Model, ServiceError> {
        let (updated, old_status) = self
            .db_pool
            .transaction::<_, (ddt::Model, String), ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = load_ddt(txn, ddt_id).await?;
                    let status = parse_status(&row)?;
                    if !status.is_open() {
                        return Err(ServiceError::InvalidTransition(format!(
                            "DDT {} is {} and cannot be cancelled",
                            row.code, row.status
                        )));
                    }

                    let movements = StockMovement::find()
                        .filter(stock_movement::Column::DdtId.eq(ddt_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    for original in &movements {
                        let meta = inventory::MovementMeta {
                            ddt_id: Some(ddt_id),
                            reference_document: Some(format!("reversal of {}", original.code)),
                            unit_cost: original.unit_cost,
                            notes: Some(format!("cancellation of DDT {}", row.code)),
                            ..Default::default()
                        };
                        inventory::apply_reversal(txn, original, actor_id, meta).await?;
                    }

                    let old_status = row.status.clone();
                    let mut active: ddt::ActiveModel = row.into();
                    active.status = Set(DdtStatus::Cancelled.as_str().to_string());
                    if let Some(reason) = reason {
                        active.notes = Set(Some(reason));
                    }
                    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;
                    Ok((updated, old_status))
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_status_change(&updated, &old_status).await;
        Ok(updated)
    }

    /// Best-effort batch confirm: each document gets its own transaction and
    /// a per-id outcome, so one failure never blocks the rest.
    #[instrument(skip(self))]
    pub async fn confirm_multiple(
        &self,
        ddt_ids: Vec<i64>,
        actor_id: Uuid,
    ) -> Result<Vec<BatchConfirmOutcome>, ServiceError> {
        let mut outcomes = Vec::with_capacity(ddt_ids.len());
        for ddt_id in ddt_ids {
            match self.confirm(ddt_id, actor_id).await {
                Ok(outcome) => outcomes.push(BatchConfirmOutcome {
                    ddt_id,
                    success: true,
                    code: Some(outcome.ddt.code),
                    error: None,
                }),
                Err(err) => outcomes.push(BatchConfirmOutcome {
                    ddt_id,
                    success: false,
                    code: None,
                    error: Some(err.to_string()),
                }),
            }
        }
        Ok(outcomes)
    }

    /// Backs the conflicting-document guard: an open outbound DDT for the
    /// same site and material means a delivery is already on its way.
    pub async fn find_open_for_site_material(
        &self,
        site_id: i64,
        material_id: i64,
    ) -> Result<Option<ddt::Model>, ServiceError> {
        find_open_for_site_material(self.db_pool.as_ref(), site_id, material_id).await
    }

    pub async fn get_by_id(&self, ddt_id: i64) -> Result<DdtWithItems, ServiceError> {
        let db = self.db_pool.as_ref();
        let row = load_ddt(db, ddt_id).await?;
        let items = DdtItem::find()
            .filter(ddt_item::Column::DdtId.eq(ddt_id))
            .order_by_asc(ddt_item::Column::Position)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(DdtWithItems { ddt: row, items })
    }

    pub async fn get_all(
        &self,
        filter: DdtFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ddt::Model>, u64), ServiceError> {
        let per_page = per_page.clamp(1, 200);
        let page = page.max(1);

        let mut query = Ddt::find().filter(ddt::Column::DeletedAt.is_null());
        if let Some(status) = filter.status {
            query = query.filter(ddt::Column::Status.eq(status.as_str()));
        }
        if let Some(ddt_type) = filter.ddt_type {
            query = query.filter(ddt::Column::DdtType.eq(ddt_type.as_str()));
        }
        if let Some(site_id) = filter.site_id {
            query = query.filter(ddt::Column::SiteId.eq(site_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(
                Condition::any()
                    .add(ddt::Column::FromWarehouseId.eq(warehouse_id))
                    .add(ddt::Column::ToWarehouseId.eq(warehouse_id)),
            );
        }

        let paginator = query
            .order_by_desc(ddt::Column::DdtDate)
            .order_by_desc(ddt::Column::Id)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;
        Ok((rows, total))
    }
}

pub(crate) async fn find_open_for_site_material<C: ConnectionTrait>(
    db: &C,
    site_id: i64,
    material_id: i64,
) -> Result<Option<ddt::Model>, ServiceError> {
    Ddt::find()
        .filter(ddt::Column::SiteId.eq(site_id))
        .filter(ddt::Column::DeletedAt.is_null())
        .filter(ddt::Column::DdtType.eq(DdtType::Outbound.as_str()))
        .filter(
            ddt::Column::Status.is_in([
                DdtStatus::Issued.as_str(),
                DdtStatus::InTransit.as_str(),
            ]),
        )
        .inner_join(DdtItem)
        .filter(ddt_item::Column::MaterialId.eq(material_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn load_ddt<C: ConnectionTrait>(db: &C, ddt_id: i64) -> Result<ddt::Model, ServiceError> {
    Ddt::find_by_id(ddt_id)
        .filter(ddt::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("DDT {}", ddt_id)))
}

fn missing_warehouse(code: &str) -> ServiceError {
    ServiceError::ValidationError(format!("DDT {} is missing a warehouse", code))
}

fn parse_status(row: &ddt::Model) -> Result<DdtStatus, ServiceError> {
    row.status()
        .ok_or_else(|| ServiceError::InternalError(format!("unknown DDT status {}", row.status)))
}

/// Rejects the whole document up front when the source warehouse cannot
/// cover its items, aggregated per material.
async fn precheck_source_stock<C: ConnectionTrait>(
    db: &C,
    from_warehouse_id: i64,
    items: &[ddt_item::Model],
    ddt_type: DdtType,
) -> Result<(), ServiceError> {
    let mut required: HashMap<i64, Decimal> = HashMap::new();
    for item in items {
        *required.entry(item.material_id).or_insert(Decimal::ZERO) += item.quantity;
    }

    for (material_id, quantity) in required {
        let row =
            inventory::get_or_create_inventory(db, material_id, from_warehouse_id).await?;
        // Deliveries may consume reserved stock; transfers and rentals only
        // take what is free.
        let coverable = if ddt_type == DdtType::Outbound {
            row.quantity_available
        } else {
            row.quantity_free()
        };
        if coverable < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "material {} at warehouse {}: requested {}, coverable {}",
                material_id, from_warehouse_id, quantity, coverable
            )));
        }
    }
    Ok(())
}

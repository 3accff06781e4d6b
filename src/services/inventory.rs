use crate::{
    db::DbPool,
    entities::{
        inventory::{self, Entity as Inventory},
        material::{self, Entity as Material},
        stock_movement::{self, Entity as StockMovement, MovementType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{ensure_positive, materials, tx_err},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, *};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Context carried onto a journal row. Everything here is descriptive;
/// none of it affects the counter arithmetic.
#[derive(Debug, Clone, Default)]
pub struct MovementMeta {
    pub ddt_id: Option<i64>,
    pub site_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub supplier_document: Option<String>,
    pub reference_document: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub notes: Option<String>,
}

/// Counter row plus the journal row the operation appended.
#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    pub inventory: inventory::Model,
    pub movement: stock_movement::Model,
}

// ---------------------------------------------------------------------------
// Ledger primitives. Generic over the connection so DdtService and
// SiteMaterialService can compose them inside their own transaction.
// ---------------------------------------------------------------------------

pub(crate) async fn get_or_create_inventory<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
) -> Result<inventory::Model, ServiceError> {
    let existing = Inventory::find()
        .filter(inventory::Column::MaterialId.eq(material_id))
        .filter(inventory::Column::WarehouseId.eq(warehouse_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    if let Some(row) = existing {
        return Ok(row);
    }

    let row = inventory::ActiveModel {
        material_id: Set(material_id),
        warehouse_id: Set(warehouse_id),
        quantity_available: Set(Decimal::ZERO),
        quantity_reserved: Set(Decimal::ZERO),
        quantity_in_transit: Set(Decimal::ZERO),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)?;

    Ok(row)
}

/// `MOV-<yyyymmdd>-<seq>`. Advisory only: the sequence restarts daily and is
/// derived from a count, so a concurrent writer can produce a duplicate.
/// Nothing keys off this value.
pub(crate) async fn next_movement_code<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let prefix = format!("MOV-{}-", now.format("%Y%m%d"));
    let today = StockMovement::find()
        .filter(stock_movement::Column::Code.starts_with(prefix.as_str()))
        .count(db)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(format!("{}{:03}", prefix, today + 1))
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_movement<C: ConnectionTrait>(
    db: &C,
    movement_type: MovementType,
    material_id: i64,
    warehouse_id: i64,
    quantity: Decimal,
    from_warehouse_id: Option<i64>,
    to_warehouse_id: Option<i64>,
    actor_id: Uuid,
    meta: MovementMeta,
) -> Result<stock_movement::Model, ServiceError> {
    let now = Utc::now();
    let code = next_movement_code(db, now).await?;

    stock_movement::ActiveModel {
        code: Set(code),
        ddt_id: Set(meta.ddt_id),
        material_id: Set(material_id),
        warehouse_id: Set(warehouse_id),
        movement_type: Set(movement_type.as_str().to_string()),
        quantity: Set(quantity),
        unit_cost: Set(meta.unit_cost),
        movement_date: Set(now),
        from_warehouse_id: Set(from_warehouse_id),
        to_warehouse_id: Set(to_warehouse_id),
        site_id: Set(meta.site_id),
        supplier_id: Set(meta.supplier_id),
        supplier_document: Set(meta.supplier_document),
        reference_document: Set(meta.reference_document),
        actor_id: Set(actor_id),
        notes: Set(meta.notes),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)
}

pub(crate) async fn apply_intake<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    quantity: Decimal,
    actor_id: Uuid,
    meta: MovementMeta,
) -> Result<LedgerOutcome, ServiceError> {
    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;

    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_available = Set(row.quantity_available + quantity);
    let updated = active.update(db).await.map_err(ServiceError::db_error)?;

    let movement = insert_movement(
        db,
        MovementType::Intake,
        material_id,
        warehouse_id,
        quantity,
        None,
        Some(warehouse_id),
        actor_id,
        meta,
    )
    .await?;

    Ok(LedgerOutcome {
        inventory: updated,
        movement,
    })
}

pub(crate) async fn apply_output<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    quantity: Decimal,
    actor_id: Uuid,
    meta: MovementMeta,
) -> Result<LedgerOutcome, ServiceError> {
    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;

    if row.quantity_free() < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "material {} at warehouse {}: requested {}, free {}",
            material_id,
            warehouse_id,
            quantity,
            row.quantity_free()
        )));
    }

    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_available = Set(row.quantity_available - quantity);
    let updated = active.update(db).await.map_err(ServiceError::db_error)?;

    let movement = insert_movement(
        db,
        MovementType::Output,
        material_id,
        warehouse_id,
        quantity,
        Some(warehouse_id),
        None,
        actor_id,
        meta,
    )
    .await?;

    Ok(LedgerOutcome {
        inventory: updated,
        movement,
    })
}

/// Reservation only earmarks stock; no journal row is written until the
/// stock actually moves.
pub(crate) async fn apply_reserve<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    quantity: Decimal,
) -> Result<inventory::Model, ServiceError> {
    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;

    if row.quantity_free() < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "material {} at warehouse {}: requested {}, free {}",
            material_id,
            warehouse_id,
            quantity,
            row.quantity_free()
        )));
    }

    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_reserved = Set(row.quantity_reserved + quantity);
    active.update(db).await.map_err(ServiceError::db_error)
}

pub(crate) async fn apply_release<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    quantity: Decimal,
) -> Result<inventory::Model, ServiceError> {
    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;

    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_reserved = Set((row.quantity_reserved - quantity).max(Decimal::ZERO));
    active.update(db).await.map_err(ServiceError::db_error)
}

/// Ships stock to a site: available drops, any matching reservation is
/// consumed, and a `site_allocation` row lands in the journal.
pub(crate) async fn apply_deliver_to_site<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    site_id: i64,
    quantity: Decimal,
    actor_id: Uuid,
    mut meta: MovementMeta,
) -> Result<LedgerOutcome, ServiceError> {
    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;

    if row.quantity_available < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "material {} at warehouse {}: requested {}, available {}",
            material_id, warehouse_id, quantity, row.quantity_available
        )));
    }

    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_available = Set(row.quantity_available - quantity);
    active.quantity_reserved = Set((row.quantity_reserved - quantity).max(Decimal::ZERO));
    let updated = active.update(db).await.map_err(ServiceError::db_error)?;

    meta.site_id = Some(site_id);
    let movement = insert_movement(
        db,
        MovementType::SiteAllocation,
        material_id,
        warehouse_id,
        quantity,
        Some(warehouse_id),
        None,
        actor_id,
        meta,
    )
    .await?;

    Ok(LedgerOutcome {
        inventory: updated,
        movement,
    })
}

pub(crate) async fn apply_return_from_site<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    site_id: i64,
    quantity: Decimal,
    actor_id: Uuid,
    mut meta: MovementMeta,
) -> Result<LedgerOutcome, ServiceError> {
    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;

    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_available = Set(row.quantity_available + quantity);
    let updated = active.update(db).await.map_err(ServiceError::db_error)?;

    meta.site_id = Some(site_id);
    let movement = insert_movement(
        db,
        MovementType::SiteReturn,
        material_id,
        warehouse_id,
        quantity,
        None,
        Some(warehouse_id),
        actor_id,
        meta,
    )
    .await?;

    Ok(LedgerOutcome {
        inventory: updated,
        movement,
    })
}

/// Moves stock between two warehouses with a single journal row. Rows are
/// touched in ascending warehouse-id order so concurrent transfers cannot
/// deadlock on each other.
pub(crate) async fn apply_transfer<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    from_warehouse_id: i64,
    to_warehouse_id: i64,
    quantity: Decimal,
    actor_id: Uuid,
    meta: MovementMeta,
) -> Result<(inventory::Model, inventory::Model, stock_movement::Model), ServiceError> {
    let (first_wh, second_wh) = if from_warehouse_id < to_warehouse_id {
        (from_warehouse_id, to_warehouse_id)
    } else {
        (to_warehouse_id, from_warehouse_id)
    };

    let first = get_or_create_inventory(db, material_id, first_wh).await?;
    let second = get_or_create_inventory(db, material_id, second_wh).await?;

    let (source, destination) = if from_warehouse_id < to_warehouse_id {
        (first, second)
    } else {
        (second, first)
    };

    if source.quantity_free() < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "material {} at warehouse {}: requested {}, free {}",
            material_id,
            from_warehouse_id,
            quantity,
            source.quantity_free()
        )));
    }

    let update_source = |row: inventory::Model| {
        let mut active: inventory::ActiveModel = row.clone().into();
        active.quantity_available = Set(row.quantity_available - quantity);
        active
    };
    let update_destination = |row: inventory::Model| {
        let mut active: inventory::ActiveModel = row.clone().into();
        active.quantity_available = Set(row.quantity_available + quantity);
        active
    };

    // Apply in ascending warehouse-id order as well.
    let (updated_source, updated_destination) = if from_warehouse_id < to_warehouse_id {
        let s = update_source(source)
            .update(db)
            .await
            .map_err(ServiceError::db_error)?;
        let d = update_destination(destination)
            .update(db)
            .await
            .map_err(ServiceError::db_error)?;
        (s, d)
    } else {
        let d = update_destination(destination)
            .update(db)
            .await
            .map_err(ServiceError::db_error)?;
        let s = update_source(source)
            .update(db)
            .await
            .map_err(ServiceError::db_error)?;
        (s, d)
    };

    let movement = insert_movement(
        db,
        MovementType::Transfer,
        material_id,
        from_warehouse_id,
        quantity,
        Some(from_warehouse_id),
        Some(to_warehouse_id),
        actor_id,
        meta,
    )
    .await?;

    Ok((updated_source, updated_destination, movement))
}

pub(crate) async fn apply_rental_out<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    quantity: Decimal,
    actor_id: Uuid,
    meta: MovementMeta,
) -> Result<LedgerOutcome, ServiceError> {
    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;

    if row.quantity_free() < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "material {} at warehouse {}: requested {}, free {}",
            material_id,
            warehouse_id,
            quantity,
            row.quantity_free()
        )));
    }

    // Guards is_rentable and bumps the catalog rental counter.
    materials::rent_out(db, material_id, quantity).await?;

    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_available = Set(row.quantity_available - quantity);
    let updated = active.update(db).await.map_err(ServiceError::db_error)?;

    let movement = insert_movement(
        db,
        MovementType::RentalOut,
        material_id,
        warehouse_id,
        quantity,
        Some(warehouse_id),
        None,
        actor_id,
        meta,
    )
    .await?;

    Ok(LedgerOutcome {
        inventory: updated,
        movement,
    })
}

pub(crate) async fn apply_rental_return<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    quantity: Decimal,
    actor_id: Uuid,
    meta: MovementMeta,
) -> Result<LedgerOutcome, ServiceError> {
    materials::rent_return(db, material_id, quantity).await?;

    let row = get_or_create_inventory(db, material_id, warehouse_id).await?;
    let mut active: inventory::ActiveModel = row.clone().into();
    active.quantity_available = Set(row.quantity_available + quantity);
    let updated = active.update(db).await.map_err(ServiceError::db_error)?;

    let movement = insert_movement(
        db,
        MovementType::RentalReturn,
        material_id,
        warehouse_id,
        quantity,
        None,
        Some(warehouse_id),
        actor_id,
        meta,
    )
    .await?;

    Ok(LedgerOutcome {
        inventory: updated,
        movement,
    })
}

/// Appends the compensating movement for `original` and undoes its counter
/// deltas. Adjustments are not reversible; the counted quantity has no
/// meaningful inverse.
pub(crate) async fn apply_reversal<C: ConnectionTrait>(
    db: &C,
    original: &stock_movement::Model,
    actor_id: Uuid,
    meta: MovementMeta,
) -> Result<LedgerOutcome, ServiceError> {
    let movement_type = original.movement_type().ok_or_else(|| {
        ServiceError::InternalError(format!("unknown movement type {}", original.movement_type))
    })?;

    match movement_type {
        MovementType::Adjustment => Err(ServiceError::ValidationError(
            "adjustment movements cannot be reversed; record a new adjustment".into(),
        )),
        MovementType::Transfer => {
            let to = original.to_warehouse_id.ok_or_else(|| {
                ServiceError::InternalError("transfer movement without destination".into())
            })?;
            let (source, _, movement) = apply_transfer(
                db,
                original.material_id,
                to,
                original.warehouse_id,
                original.quantity,
                actor_id,
                meta,
            )
            .await?;
            Ok(LedgerOutcome {
                inventory: source,
                movement,
            })
        }
        MovementType::Intake => {
            apply_output(
                db,
                original.material_id,
                original.warehouse_id,
                original.quantity,
                actor_id,
                meta,
            )
            .await
        }
        MovementType::Output => {
            apply_intake(
                db,
                original.material_id,
                original.warehouse_id,
                original.quantity,
                actor_id,
                meta,
            )
            .await
        }
        MovementType::SiteAllocation => {
            apply_return_from_site(
                db,
                original.material_id,
                original.warehouse_id,
                original.site_id.unwrap_or_default(),
                original.quantity,
                actor_id,
                meta,
            )
            .await
        }
        MovementType::SiteReturn => {
            apply_deliver_to_site(
                db,
                original.material_id,
                original.warehouse_id,
                original.site_id.unwrap_or_default(),
                original.quantity,
                actor_id,
                meta,
            )
            .await
        }
        MovementType::RentalOut => {
            apply_rental_return(
                db,
                original.material_id,
                original.warehouse_id,
                original.quantity,
                actor_id,
                meta,
            )
            .await
        }
        MovementType::RentalReturn => {
            apply_rental_out(
                db,
                original.material_id,
                original.warehouse_id,
                original.quantity,
                actor_id,
                meta,
            )
            .await
        }
    }
}

// ---------------------------------------------------------------------------
// Service surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub material_id: i64,
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub supplier_id: Option<i64>,
    pub supplier_document: Option<String>,
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct OutputRequest {
    pub material_id: i64,
    pub warehouse_id: i64,
    pub quantity: Decimal,
    pub reference_document: Option<String>,
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

/// `quantity_change` is signed: positive for stock found, negative for
/// shrinkage.
#[derive(Debug, Clone)]
pub struct AdjustRequest {
    pub material_id: i64,
    pub warehouse_id: i64,
    pub quantity_change: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reason: String,
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub material_id: i64,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct MovementHistoryFilter {
    pub material_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub movement_type: Option<MovementType>,
    pub ddt_id: Option<i64>,
    pub site_id: Option<i64>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub material_id: Option<i64>,
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ValuationRow {
    pub material_id: i64,
    pub material_name: String,
    pub warehouse_id: i64,
    pub quantity_available: Decimal,
    pub standard_cost: Decimal,
    pub stock_value: Decimal,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ValuationReport {
    pub rows: Vec<ValuationRow>,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LowStockRow {
    pub inventory: inventory::Model,
    pub is_critical: bool,
    pub reorder_quantity: Decimal,
}

/// Post-commit event fan-out shared by every service that appends to the
/// journal. Consumers are best-effort, so a dead channel is logged and never
/// fails the mutation that already committed.
pub(crate) async fn publish_movement_events(event_sender: &EventSender, outcome: &LedgerOutcome) {
    if let Err(e) = event_sender
        .send(Event::MovementRecorded {
            movement_id: outcome.movement.id,
            code: outcome.movement.code.clone(),
            movement_type: outcome.movement.movement_type.clone(),
            material_id: outcome.movement.material_id,
            warehouse_id: outcome.movement.warehouse_id,
            quantity: outcome.movement.quantity,
            actor_id: outcome.movement.actor_id,
        })
        .await
    {
        warn!(code = %outcome.movement.code, error = %e, "dropped movement event");
    }

    if let Some(minimum) = outcome.inventory.minimum_stock {
        if outcome.inventory.is_low_stock() {
            if let Err(e) = event_sender
                .send(Event::LowStock {
                    material_id: outcome.inventory.material_id,
                    warehouse_id: outcome.inventory.warehouse_id,
                    available: outcome.inventory.quantity_available,
                    minimum,
                })
                .await
            {
                warn!(
                    material_id = outcome.inventory.material_id,
                    error = %e,
                    "dropped low-stock event"
                );
            }
        }
    }
}

pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn publish_movement(&self, outcome: &LedgerOutcome) {
        publish_movement_events(&self.event_sender, outcome).await;
    }

    #[instrument(skip(self))]
    pub async fn intake(&self, req: IntakeRequest) -> Result<LedgerOutcome, ServiceError> {
        ensure_positive(req.quantity, "quantity")?;

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_intake(
                        txn,
                        req.material_id,
                        req.warehouse_id,
                        req.quantity,
                        req.actor_id,
                        MovementMeta {
                            supplier_id: req.supplier_id,
                            supplier_document: req.supplier_document,
                            unit_cost: req.unit_cost,
                            notes: req.notes,
                            ..Default::default()
                        },
                    )
                    .await
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn output(&self, req: OutputRequest) -> Result<LedgerOutcome, ServiceError> {
        ensure_positive(req.quantity, "quantity")?;

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_output(
                        txn,
                        req.material_id,
                        req.warehouse_id,
                        req.quantity,
                        req.actor_id,
                        MovementMeta {
                            reference_document: req.reference_document,
                            notes: req.notes,
                            ..Default::default()
                        },
                    )
                    .await
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    /// Applies a signed correction to the available quantity and journals its
    /// magnitude as an `adjustment`.
    #[instrument(skip(self))]
    pub async fn adjust(&self, req: AdjustRequest) -> Result<LedgerOutcome, ServiceError> {
        if req.quantity_change == Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "quantity_change must not be zero".into(),
            ));
        }
        if req.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "an adjustment requires a reason".into(),
            ));
        }

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let row =
                        get_or_create_inventory(txn, req.material_id, req.warehouse_id).await?;

                    let new_quantity = row.quantity_available + req.quantity_change;
                    if new_quantity < Decimal::ZERO {
                        return Err(ServiceError::InsufficientStock(format!(
                            "material {} at warehouse {}: adjustment of {} would drive {} negative",
                            req.material_id,
                            req.warehouse_id,
                            req.quantity_change,
                            row.quantity_available
                        )));
                    }
                    if new_quantity < row.quantity_reserved {
                        return Err(ServiceError::ValidationError(format!(
                            "adjusted quantity {} is below the reserved quantity {}",
                            new_quantity, row.quantity_reserved
                        )));
                    }

                    let mut active: inventory::ActiveModel = row.clone().into();
                    active.quantity_available = Set(new_quantity);
                    active.last_count_date = Set(Some(Utc::now()));
                    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                    let mut note = format!(
                        "{} -> {} ({})",
                        row.quantity_available, new_quantity, req.reason
                    );
                    if let Some(extra) = req.notes {
                        note.push_str("; ");
                        note.push_str(&extra);
                    }
                    let movement = insert_movement(
                        txn,
                        MovementType::Adjustment,
                        req.material_id,
                        req.warehouse_id,
                        req.quantity_change.abs(),
                        None,
                        None,
                        req.actor_id,
                        MovementMeta {
                            unit_cost: req.unit_cost,
                            notes: Some(note),
                            ..Default::default()
                        },
                    )
                    .await?;

                    Ok(LedgerOutcome {
                        inventory: updated,
                        movement,
                    })
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        req: TransferRequest,
    ) -> Result<(inventory::Model, inventory::Model, stock_movement::Model), ServiceError> {
        ensure_positive(req.quantity, "quantity")?;
        if req.from_warehouse_id == req.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "source and destination warehouse must differ".into(),
            ));
        }

        let (source, destination, movement) = self
            .db_pool
            .transaction::<_, (inventory::Model, inventory::Model, stock_movement::Model), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        apply_transfer(
                            txn,
                            req.material_id,
                            req.from_warehouse_id,
                            req.to_warehouse_id,
                            req.quantity,
                            req.actor_id,
                            MovementMeta {
                                notes: req.notes,
                                ..Default::default()
                            },
                        )
                        .await
                    })
                },
            )
            .await
            .map_err(tx_err)?;

        self.publish_movement(&LedgerOutcome {
            inventory: source.clone(),
            movement: movement.clone(),
        })
        .await;
        Ok((source, destination, movement))
    }

    #[instrument(skip(self))]
    pub async fn reserve_for_site(
        &self,
        material_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
    ) -> Result<inventory::Model, ServiceError> {
        ensure_positive(quantity, "quantity")?;
        self.db_pool
            .transaction::<_, inventory::Model, ServiceError>(move |txn| {
                Box::pin(
                    async move { apply_reserve(txn, material_id, warehouse_id, quantity).await },
                )
            })
            .await
            .map_err(tx_err)
    }

    #[instrument(skip(self))]
    pub async fn release_reservation(
        &self,
        material_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
    ) -> Result<inventory::Model, ServiceError> {
        ensure_positive(quantity, "quantity")?;
        self.db_pool
            .transaction::<_, inventory::Model, ServiceError>(move |txn| {
                Box::pin(
                    async move { apply_release(txn, material_id, warehouse_id, quantity).await },
                )
            })
            .await
            .map_err(tx_err)
    }

    #[instrument(skip(self))]
    pub async fn deliver_to_site(
        &self,
        material_id: i64,
        warehouse_id: i64,
        site_id: i64,
        quantity: Decimal,
        actor_id: Uuid,
        meta: MovementMeta,
    ) -> Result<LedgerOutcome, ServiceError> {
        ensure_positive(quantity, "quantity")?;

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_deliver_to_site(
                        txn,
                        material_id,
                        warehouse_id,
                        site_id,
                        quantity,
                        actor_id,
                        meta,
                    )
                    .await
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn return_from_site(
        &self,
        material_id: i64,
        warehouse_id: i64,
        site_id: i64,
        quantity: Decimal,
        actor_id: Uuid,
        meta: MovementMeta,
    ) -> Result<LedgerOutcome, ServiceError> {
        ensure_positive(quantity, "quantity")?;

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_return_from_site(
                        txn,
                        material_id,
                        warehouse_id,
                        site_id,
                        quantity,
                        actor_id,
                        meta,
                    )
                    .await
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn rental_out(
        &self,
        material_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
        actor_id: Uuid,
        meta: MovementMeta,
    ) -> Result<LedgerOutcome, ServiceError> {
        ensure_positive(quantity, "quantity")?;

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_rental_out(txn, material_id, warehouse_id, quantity, actor_id, meta).await
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn rental_return(
        &self,
        material_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
        actor_id: Uuid,
        meta: MovementMeta,
    ) -> Result<LedgerOutcome, ServiceError> {
        ensure_positive(quantity, "quantity")?;

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_rental_return(txn, material_id, warehouse_id, quantity, actor_id, meta)
                        .await
                })
            })
            .await
            .map_err(tx_err)?;

        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn update_minimum_stock(
        &self,
        material_id: i64,
        warehouse_id: i64,
        minimum: Option<Decimal>,
    ) -> Result<inventory::Model, ServiceError> {
        if let Some(m) = minimum {
            if m < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "minimum_stock must not be negative".into(),
                ));
            }
        }
        let db = self.db_pool.as_ref();
        let row = get_or_create_inventory(db, material_id, warehouse_id).await?;
        let mut active: inventory::ActiveModel = row.into();
        active.minimum_stock = Set(minimum);
        active.update(db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn update_maximum_stock(
        &self,
        material_id: i64,
        warehouse_id: i64,
        maximum: Option<Decimal>,
    ) -> Result<inventory::Model, ServiceError> {
        if let Some(m) = maximum {
            if m < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "maximum_stock must not be negative".into(),
                ));
            }
        }
        let db = self.db_pool.as_ref();
        let row = get_or_create_inventory(db, material_id, warehouse_id).await?;
        let mut active: inventory::ActiveModel = row.into();
        active.maximum_stock = Set(maximum);
        active.update(db).await.map_err(ServiceError::db_error)
    }

    /// Appends a compensating movement of the opposite type and undoes the
    /// counter deltas. The original row is never touched.
    #[instrument(skip(self))]
    pub async fn reverse_movement(
        &self,
        movement_id: i64,
        reason: String,
        actor_id: Uuid,
    ) -> Result<LedgerOutcome, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a reversal requires a reason".into(),
            ));
        }

        let outcome = self
            .db_pool
            .transaction::<_, LedgerOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let original = StockMovement::find_by_id(movement_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("stock movement {}", movement_id))
                        })?;

                    let reference = format!("reversal of {}", original.code);
                    let already = StockMovement::find()
                        .filter(stock_movement::Column::ReferenceDocument.eq(reference.as_str()))
                        .count(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    if already > 0 {
                        return Err(ServiceError::ValidationError(format!(
                            "movement {} has already been reversed",
                            original.code
                        )));
                    }

                    let meta = MovementMeta {
                        reference_document: Some(reference),
                        unit_cost: original.unit_cost,
                        notes: Some(reason),
                        ..Default::default()
                    };

                    apply_reversal(txn, &original, actor_id, meta).await
                })
            })
            .await
            .map_err(tx_err)?;

        if let Err(e) = self
            .event_sender
            .send(Event::MovementReversed {
                original_id: movement_id,
                reversal_id: outcome.movement.id,
            })
            .await
        {
            warn!(movement_id, error = %e, "dropped reversal event");
        }
        self.publish_movement(&outcome).await;
        Ok(outcome)
    }

    // -- reads -------------------------------------------------------------

    pub async fn get_inventory(
        &self,
        filter: InventoryFilter,
    ) -> Result<Vec<inventory::Model>, ServiceError> {
        let mut query = Inventory::find();
        if let Some(material_id) = filter.material_id {
            query = query.filter(inventory::Column::MaterialId.eq(material_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(inventory::Column::WarehouseId.eq(warehouse_id));
        }
        query
            .order_by_asc(inventory::Column::WarehouseId)
            .order_by_asc(inventory::Column::MaterialId)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn get_movement_history(
        &self,
        filter: MovementHistoryFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();
        let per_page = per_page.clamp(1, 200);
        let page = page.max(1);

        let mut query = StockMovement::find();
        if let Some(material_id) = filter.material_id {
            query = query.filter(stock_movement::Column::MaterialId.eq(material_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(stock_movement::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type.as_str()));
        }
        if let Some(ddt_id) = filter.ddt_id {
            query = query.filter(stock_movement::Column::DdtId.eq(ddt_id));
        }
        if let Some(site_id) = filter.site_id {
            query = query.filter(stock_movement::Column::SiteId.eq(site_id));
        }
        if let Some(from) = filter.from_date {
            query = query.filter(stock_movement::Column::MovementDate.gte(from));
        }
        if let Some(to) = filter.to_date {
            query = query.filter(stock_movement::Column::MovementDate.lte(to));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::MovementDate)
            .order_by_desc(stock_movement::Column::Id)
            .paginate(db, per_page);
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

    pub async fn get_valuation(
        &self,
        warehouse_id: Option<i64>,
    ) -> Result<ValuationReport, ServiceError> {
        let mut query = Inventory::find().find_also_related(Material);
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(inventory::Column::WarehouseId.eq(warehouse_id));
        }
        let pairs = query
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let mut rows = Vec::with_capacity(pairs.len());
        let mut total_value = Decimal::ZERO;
        for (row, mat) in pairs {
            let mat: material::Model = mat.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "inventory row {} references missing material {}",
                    row.id, row.material_id
                ))
            })?;
            let stock_value = row.stock_value(mat.standard_cost);
            total_value += stock_value;
            rows.push(ValuationRow {
                material_id: mat.id,
                material_name: mat.name,
                warehouse_id: row.warehouse_id,
                quantity_available: row.quantity_available,
                standard_cost: mat.standard_cost,
                stock_value,
            });
        }
        Ok(ValuationReport { rows, total_value })
    }

    pub async fn get_low_stock(
        &self,
        warehouse_id: Option<i64>,
    ) -> Result<Vec<LowStockRow>, ServiceError> {
        let mut query = Inventory::find().filter(inventory::Column::MinimumStock.is_not_null());
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(inventory::Column::WarehouseId.eq(warehouse_id));
        }
        let rows = query
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(rows
            .into_iter()
            .filter(|row| row.is_low_stock())
            .map(|row| {
                let minimum = row.minimum_stock.unwrap_or(Decimal::ZERO);
                let maximum = row.maximum_stock.unwrap_or(minimum);
                LowStockRow {
                    is_critical: inventory::is_critical_stock(row.quantity_available, minimum),
                    reorder_quantity: inventory::reorder_quantity(
                        row.quantity_available,
                        minimum,
                        maximum,
                    ),
                    inventory: row,
                }
            })
            .collect())
    }
}

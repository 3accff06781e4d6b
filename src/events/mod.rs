use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Events emitted after a committed state change. Consumers are best-effort;
/// the database is always the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MovementRecorded {
        movement_id: i64,
        code: String,
        movement_type: String,
        material_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
        actor_id: Uuid,
    },
    MovementReversed {
        original_id: i64,
        reversal_id: i64,
    },
    LowStock {
        material_id: i64,
        warehouse_id: i64,
        available: Decimal,
        minimum: Decimal,
    },

    DdtCreated {
        ddt_id: i64,
        code: String,
    },
    DdtStatusChanged {
        ddt_id: i64,
        code: String,
        old_status: String,
        new_status: String,
    },

    SiteMaterialCreated {
        site_material_id: i64,
        site_id: i64,
        is_extra: bool,
    },
    SiteMaterialUpdated {
        site_material_id: i64,
        site_id: i64,
        status: String,
    },
    SiteMaterialDeleted {
        site_material_id: i64,
        site_id: i64,
    },
}

/// Drains the event channel and logs each event. Alerting hooks branch off
/// here; everything else is informational.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStock {
                material_id,
                warehouse_id,
                available,
                minimum,
            } => {
                warn!(
                    material_id,
                    warehouse_id,
                    %available,
                    %minimum,
                    "Low stock: available has fallen below minimum"
                );
            }
            Event::MovementRecorded {
                code,
                movement_type,
                material_id,
                warehouse_id,
                quantity,
                ..
            } => {
                info!(
                    code,
                    movement_type,
                    material_id,
                    warehouse_id,
                    %quantity,
                    "Stock movement recorded"
                );
            }
            Event::DdtStatusChanged {
                code,
                old_status,
                new_status,
                ..
            } => {
                info!(code, old_status, new_status, "DDT status changed");
            }
            _ => {
                info!("Event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery note status. Strictly forward-moving; `cancelled` is terminal
/// and reachable only from the two open states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DdtStatus {
    Issued,
    InTransit,
    Delivered,
    Cancelled,
}

impl DdtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DdtStatus::Issued => "issued",
            DdtStatus::InTransit => "in_transit",
            DdtStatus::Delivered => "delivered",
            DdtStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "issued" => Some(DdtStatus::Issued),
            "in_transit" => Some(DdtStatus::InTransit),
            "delivered" => Some(DdtStatus::Delivered),
            "cancelled" => Some(DdtStatus::Cancelled),
            _ => None,
        }
    }

    /// Open documents are the only ones that can still be confirmed,
    /// cancelled, or moved to in-transit.
    pub fn is_open(&self) -> bool {
        matches!(self, DdtStatus::Issued | DdtStatus::InTransit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DdtType {
    /// Goods leaving a warehouse towards a site or customer.
    Outbound,
    /// Goods arriving from a supplier into a warehouse.
    Inbound,
    /// Rentable equipment leaving on hire.
    Rental,
    /// Internal warehouse-to-warehouse move.
    Transfer,
}

impl DdtType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DdtType::Outbound => "outbound",
            DdtType::Inbound => "inbound",
            DdtType::Rental => "rental",
            DdtType::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "outbound" => Some(DdtType::Outbound),
            "inbound" => Some(DdtType::Inbound),
            "rental" => Some(DdtType::Rental),
            "transfer" => Some(DdtType::Transfer),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ddts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub ddt_type: String,
    pub status: String,
    /// Counterparty document number, when one exists.
    pub ddt_number: Option<String>,
    pub ddt_date: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub carrier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub from_warehouse_id: Option<i64>,
    pub to_warehouse_id: Option<i64>,
    pub site_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub created_by: Uuid,
    pub notes: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn status(&self) -> Option<DdtStatus> {
        DdtStatus::from_str(&self.status)
    }

    pub fn ddt_type(&self) -> Option<DdtType> {
        DdtType::from_str(&self.ddt_type)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ddt_item::Entity")]
    DdtItem,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    StockMovement,
}

impl Related<super::ddt_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DdtItem.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovement.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_states() {
        assert!(DdtStatus::Issued.is_open());
        assert!(DdtStatus::InTransit.is_open());
        assert!(!DdtStatus::Delivered.is_open());
        assert!(!DdtStatus::Cancelled.is_open());
    }

    #[test]
    fn status_tokens_are_lowercase() {
        assert_eq!(DdtStatus::InTransit.as_str(), "in_transit");
        assert_eq!(DdtStatus::from_str("in_transit"), Some(DdtStatus::InTransit));
        assert_eq!(DdtStatus::from_str("draft"), None);
    }
}

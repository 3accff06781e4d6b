use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of stock movements. Quantities are always recorded as positive
/// magnitudes; the type carries the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    Intake,
    Output,
    Adjustment,
    Transfer,
    SiteAllocation,
    SiteReturn,
    RentalOut,
    RentalReturn,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Intake => "intake",
            MovementType::Output => "output",
            MovementType::Adjustment => "adjustment",
            MovementType::Transfer => "transfer",
            MovementType::SiteAllocation => "site_allocation",
            MovementType::SiteReturn => "site_return",
            MovementType::RentalOut => "rental_out",
            MovementType::RentalReturn => "rental_return",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "intake" => Some(MovementType::Intake),
            "output" => Some(MovementType::Output),
            "adjustment" => Some(MovementType::Adjustment),
            "transfer" => Some(MovementType::Transfer),
            "site_allocation" => Some(MovementType::SiteAllocation),
            "site_return" => Some(MovementType::SiteReturn),
            "rental_out" => Some(MovementType::RentalOut),
            "rental_return" => Some(MovementType::RentalReturn),
            _ => None,
        }
    }

    pub fn is_outgoing(&self) -> bool {
        matches!(
            self,
            MovementType::Output | MovementType::SiteAllocation | MovementType::RentalOut
        )
    }

    pub fn is_incoming(&self) -> bool {
        matches!(
            self,
            MovementType::Intake | MovementType::SiteReturn | MovementType::RentalReturn
        )
    }
}

/// Append-only journal of every stock change. Rows are never mutated or
/// deleted; reversals append a compensating row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub code: String,
    pub ddt_id: Option<i64>,
    pub material_id: i64,
    pub warehouse_id: i64,
    pub movement_type: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub unit_cost: Option<Decimal>,
    pub movement_date: DateTime<Utc>,
    pub from_warehouse_id: Option<i64>,
    pub to_warehouse_id: Option<i64>,
    pub site_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub supplier_document: Option<String>,
    pub reference_document: Option<String>,
    pub actor_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn movement_type(&self) -> Option<MovementType> {
        MovementType::from_str(&self.movement_type)
    }

    pub fn total_value(&self) -> Decimal {
        self.quantity * self.unit_cost.unwrap_or(Decimal::ZERO)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
    #[sea_orm(
        belongs_to = "super::ddt::Entity",
        from = "Column::DdtId",
        to = "super::ddt::Column::Id"
    )]
    Ddt,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl Related<super::ddt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ddt.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_round_trip() {
        for t in [
            MovementType::Intake,
            MovementType::Output,
            MovementType::Adjustment,
            MovementType::Transfer,
            MovementType::SiteAllocation,
            MovementType::SiteReturn,
            MovementType::RentalOut,
            MovementType::RentalReturn,
        ] {
            assert_eq!(MovementType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(MovementType::from_str("waste"), None);
    }

    #[test]
    fn direction_predicates() {
        assert!(MovementType::SiteAllocation.is_outgoing());
        assert!(MovementType::SiteReturn.is_incoming());
        assert!(!MovementType::Transfer.is_incoming());
        assert!(!MovementType::Transfer.is_outgoing());
        assert!(!MovementType::Adjustment.is_incoming());
    }
}

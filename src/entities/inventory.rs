use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Per (material, warehouse) stock counters. One row per pair, created
/// lazily on the first movement that touches it. Counters are only mutated
/// through the inventory service so every change lands in the journal.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub material_id: i64,
    pub warehouse_id: i64,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity_available: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity_reserved: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity_in_transit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub minimum_stock: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub maximum_stock: Option<Decimal>,
    pub last_count_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Available minus reserved: the quantity that can still be committed.
    pub fn quantity_free(&self) -> Decimal {
        (self.quantity_available - self.quantity_reserved).max(Decimal::ZERO)
    }

    pub fn is_low_stock(&self) -> bool {
        match self.minimum_stock {
            Some(min) => self.quantity_available <= min,
            None => false,
        }
    }

    pub fn stock_value(&self, standard_cost: Decimal) -> Decimal {
        self.quantity_available * standard_cost
    }
}

/// Quantity to order to bring stock back up to `maximum_stock`; zero while
/// current stock sits at or above the minimum.
pub fn reorder_quantity(current: Decimal, minimum: Decimal, maximum: Decimal) -> Decimal {
    if current >= minimum {
        return Decimal::ZERO;
    }
    (maximum - current).max(Decimal::ZERO)
}

/// Stock at or below half the minimum threshold.
pub fn is_critical_stock(current: Decimal, minimum: Decimal) -> bool {
    current * Decimal::TWO <= minimum
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
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
    use rust_decimal_macros::dec;

    fn row(available: Decimal, reserved: Decimal, minimum: Option<Decimal>) -> Model {
        Model {
            id: 1,
            material_id: 1,
            warehouse_id: 1,
            quantity_available: available,
            quantity_reserved: reserved,
            quantity_in_transit: Decimal::ZERO,
            minimum_stock: minimum,
            maximum_stock: None,
            last_count_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn quantity_free_is_available_minus_reserved() {
        assert_eq!(row(dec!(150), dec!(120), None).quantity_free(), dec!(30));
    }

    #[test]
    fn quantity_free_never_goes_negative() {
        assert_eq!(row(dec!(10), dec!(25), None).quantity_free(), Decimal::ZERO);
    }

    #[test]
    fn low_stock_at_threshold() {
        assert!(row(dec!(5), dec!(0), Some(dec!(5))).is_low_stock());
        assert!(!row(dec!(5.01), dec!(0), Some(dec!(5))).is_low_stock());
        assert!(!row(dec!(0), dec!(0), None).is_low_stock());
    }

    #[test]
    fn reorder_quantity_targets_maximum() {
        assert_eq!(reorder_quantity(dec!(3), dec!(10), dec!(50)), dec!(47));
        assert_eq!(reorder_quantity(dec!(10), dec!(10), dec!(50)), Decimal::ZERO);
        assert_eq!(reorder_quantity(dec!(60), dec!(10), dec!(50)), Decimal::ZERO);
    }

    #[test]
    fn critical_stock_at_half_minimum() {
        assert!(is_critical_stock(dec!(5), dec!(10)));
        assert!(!is_critical_stock(dec!(5.01), dec!(10)));
    }
}

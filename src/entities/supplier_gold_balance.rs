//! Supplier gold balance entity - Weight received from a supplier versus weight paid for.
//!
//! The outstanding weight debt is derived from the two stored columns and is never
//! stored on its own.

use super::lookups::Karat;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supplier gold balance database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supplier_gold_balances")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Supplier the balance is held with
    pub supplier_id: i64,
    /// Purity of the gold
    pub karat: Karat,
    /// Total grams received
    #[sea_orm(column_type = "Decimal(Some((14, 3)))")]
    pub weight_received: Decimal,
    /// Grams settled, by money or by gold
    #[sea_orm(column_type = "Decimal(Some((14, 3)))")]
    pub weight_paid_for: Decimal,
    /// Soft delete flag
    pub is_active: bool,
    /// User who created the row
    pub created_by: String,
    /// User who last modified the row
    pub modified_by: Option<String>,
    /// When the row was created
    pub created_at: DateTimeUtc,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Grams received but not yet paid for
    #[must_use]
    pub fn outstanding_weight_debt(&self) -> Decimal {
        self.weight_received - self.weight_paid_for
    }
}

/// Defines relationships between `SupplierGoldBalance` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each balance belongs to one supplier
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Raw gold ownership entity - How much of a supplier's raw gold the merchant owns.
//!
//! One row per supplier, branch and karat. `owned_weight` never exceeds
//! `total_weight`, and `ownership_percentage` is always `owned / total × 100`.

use super::lookups::Karat;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw gold ownership database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "raw_gold_ownership")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Supplier that delivered the gold
    pub supplier_id: i64,
    /// Branch holding the gold
    pub branch_id: i64,
    /// Purity of the gold
    pub karat: Karat,
    /// Grams held
    #[sea_orm(column_type = "Decimal(Some((14, 3)))")]
    pub total_weight: Decimal,
    /// Grams paid for
    #[sea_orm(column_type = "Decimal(Some((14, 3)))")]
    pub owned_weight: Decimal,
    /// `owned_weight / total_weight × 100`, two decimals
    #[sea_orm(column_type = "Decimal(Some((7, 2)))")]
    pub ownership_percentage: Decimal,
    /// Money still owed for the unowned grams
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub outstanding_cost: Decimal,
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
    /// Grams still owned by the supplier
    #[must_use]
    pub fn unowned_weight(&self) -> Decimal {
        self.total_weight - self.owned_weight
    }
}

/// Defines relationships between `RawGoldOwnership` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each row tracks one supplier
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
    /// Each row tracks gold held at one branch
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Product entity - A finished piece of jewelry held in stock.
//!
//! Each product has a karat, a weight in grams and a making charge. Once a product is
//! sold its pricing fields are frozen; only the soft delete flag may still change.

use super::lookups::{Karat, MakingChargeKind, ProductStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stock keeping unit, unique across branches
    #[sea_orm(unique)]
    pub sku: String,
    /// Display name (e.g., "Rope Chain 50cm")
    pub name: String,
    /// Category used for tax lookup (e.g., "rings", "chains")
    pub category: String,
    /// Gold purity
    pub karat: Karat,
    /// Gold weight in grams
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub weight: Decimal,
    /// Making charge amount, interpreted according to `making_charge_kind`
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub making_charge: Decimal,
    /// Whether the making charge is per piece or per gram
    pub making_charge_kind: MakingChargeKind,
    /// Supplier the piece came from, if tracked
    pub supplier_id: Option<i64>,
    /// Branch holding the piece
    pub branch_id: i64,
    /// Stock state
    pub status: ProductStatus,
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

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product is held by one branch
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
    /// Each product may come from one supplier
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Order item entity - One priced line of an order.
//!
//! Every input to the price is copied onto the row when the order is taken, so the line
//! can be recomputed later without reading the current gold or tax rates.

use super::lookups::{Karat, MakingChargeKind};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this line belongs to
    pub order_id: i64,
    /// Piece sold or returned; `None` for repair lines
    pub product_id: Option<i64>,
    /// Line description
    pub description: String,
    /// Purity priced
    pub karat: Karat,
    /// Grams priced
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub weight: Decimal,
    /// Number of pieces
    pub quantity: i32,
    /// Gold rate row the price was taken from
    pub gold_rate_id: Option<i64>,
    /// Snapshot of the per-gram rate
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub rate_per_gram: Decimal,
    /// Snapshot of the making charge amount
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub making_charge: Decimal,
    /// Snapshot of the making charge kind
    pub making_charge_kind: MakingChargeKind,
    /// Discount requested for the line
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub discount: Decimal,
    /// Snapshot of the tax percentage
    #[sea_orm(column_type = "Decimal(Some((7, 4)))")]
    pub tax_percent: Decimal,
    /// Gold value plus making charge
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub subtotal: Decimal,
    /// Discount actually applied, never above the subtotal
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub applied_discount: Decimal,
    /// Tax on the post-discount amount
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub tax: Decimal,
    /// Amount charged for the line
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub total: Decimal,
    /// Set when the piece on this line has been returned
    pub is_returned: bool,
    /// When the line was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `OrderItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    /// Each item may reference one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Order entity - Header of a sale, return or repair.
//!
//! Totals are the sums of the item rows. Return orders point back at the sale they
//! refund through `original_order_id`.

use super::lookups::{OrderStatus, OrderType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable number printed on receipts
    #[sea_orm(unique)]
    pub order_number: String,
    /// Sale, return or repair
    pub order_type: OrderType,
    /// Lifecycle state
    pub status: OrderStatus,
    /// Branch the order was taken at
    pub branch_id: i64,
    /// Customer, if known
    pub customer_id: Option<i64>,
    /// Sale being refunded, for return orders
    pub original_order_id: Option<i64>,
    /// Free-form note (repair description, return reason)
    pub notes: Option<String>,
    /// Sum of line subtotals
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub subtotal: Decimal,
    /// Sum of line discounts
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub discount: Decimal,
    /// Sum of line taxes
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub tax: Decimal,
    /// Sum of line totals
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub total: Decimal,
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

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many items
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    /// Each order is taken at one branch
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
    /// Each order may belong to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

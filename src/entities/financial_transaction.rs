//! Financial transaction entity - The money side of an order.
//!
//! One row per order. Amounts are stored unsigned; the order type says whether money
//! came in (sale, repair) or went out (return).

use super::lookups::{FinancialStatus, OrderType, PaymentMethod};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Financial transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this transaction settles
    #[sea_orm(unique)]
    pub order_id: i64,
    /// Branch the money was handled at
    pub branch_id: i64,
    /// Copy of the order type
    pub transaction_type: OrderType,
    /// Gold value plus making charges
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub subtotal: Decimal,
    /// Discount applied
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub discount: Decimal,
    /// Tax charged
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub tax: Decimal,
    /// Amount due (or refunded)
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub total: Decimal,
    /// Amount tendered (or paid out)
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub amount_paid: Decimal,
    /// Change handed back for cash payments
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub change_due: Decimal,
    /// Tender used
    pub payment_method: PaymentMethod,
    /// Trading day the transaction counts towards
    pub business_date: Date,
    /// Posting state
    pub status: FinancialStatus,
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
    /// Effect of this transaction on the cash drawer.
    ///
    /// Only posted cash transactions move drawer cash: sales and repairs add their
    /// total, returns take it out.
    #[must_use]
    pub fn cash_effect(&self) -> Decimal {
        if self.payment_method != PaymentMethod::Cash || self.status != FinancialStatus::Posted {
            return Decimal::ZERO;
        }
        match self.transaction_type {
            OrderType::Sale | OrderType::Repair => self.total,
            OrderType::Return => -self.total,
        }
    }
}

/// Defines relationships between `FinancialTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction settles one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Treasury transaction entity - One append-only movement on a treasury account.
//!
//! `amount` is always positive; `direction` gives the sign. `balance_after` records the
//! account balance once this movement was applied.

use super::lookups::{Direction, TreasuryTransactionType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Treasury transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "treasury_transactions")]
pub struct Model {
    /// Unique identifier for the movement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account moved
    pub treasury_account_id: i64,
    /// Credit or debit
    pub direction: Direction,
    /// Unsigned amount
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub amount: Decimal,
    /// Reason for the movement
    pub transaction_type: TreasuryTransactionType,
    /// Kind of row referenced (e.g., `"CashDrawerBalance"`)
    pub reference_type: Option<String>,
    /// Id of the referenced row
    pub reference_id: Option<i64>,
    /// Movement this one reverses
    pub reverses_id: Option<i64>,
    /// Human-readable description
    pub description: String,
    /// Account balance after this movement
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub balance_after: Decimal,
    /// User who posted the movement
    pub created_by: String,
    /// When the movement was posted
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Amount with the direction applied
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }
}

/// Defines relationships between `TreasuryTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each movement belongs to one account
    #[sea_orm(
        belongs_to = "super::treasury_account::Entity",
        from = "Column::TreasuryAccountId",
        to = "super::treasury_account::Column::Id"
    )]
    TreasuryAccount,
}

impl Related<super::treasury_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TreasuryAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

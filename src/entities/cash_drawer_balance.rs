//! Cash drawer balance entity - Daily open/close count of a branch's till.
//!
//! Cash over/short is derived from the expected and actual closing amounts.

use super::lookups::DrawerStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cash drawer balance database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_drawer_balances")]
pub struct Model {
    /// Unique identifier for the drawer day
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Branch the drawer belongs to
    pub branch_id: i64,
    /// Trading day
    pub business_date: Date,
    /// Float placed in the drawer at opening
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub opening_balance: Decimal,
    /// Opening balance plus net cash taken, set at close
    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub expected_closing_balance: Option<Decimal>,
    /// Counted cash, set at close
    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub actual_closing_balance: Option<Decimal>,
    /// Lifecycle state
    pub status: DrawerStatus,
    /// User who opened the drawer
    pub opened_by: String,
    /// User who closed the drawer
    pub closed_by: Option<String>,
    /// Soft delete flag
    pub is_active: bool,
    /// When the drawer was opened
    pub created_at: DateTimeUtc,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// `actual − expected` once the drawer is closed
    #[must_use]
    pub fn cash_over_short(&self) -> Option<Decimal> {
        match (self.actual_closing_balance, self.expected_closing_balance) {
            (Some(actual), Some(expected)) => Some(actual - expected),
            _ => None,
        }
    }
}

/// Defines relationships between `CashDrawerBalance` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each drawer belongs to one branch
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

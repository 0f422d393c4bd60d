//! Gold rate entity - Price per gram for one karat at a point in time.
//!
//! Rates are append-only. The current rate for a karat is the newest active row;
//! order items keep the id of the row they were priced from.

use super::lookups::Karat;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Gold rate database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gold_rates")]
pub struct Model {
    /// Unique identifier for the rate row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Purity this rate applies to
    pub karat: Karat,
    /// Price of one gram
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub rate_per_gram: Decimal,
    /// Inactive rows are ignored when looking up the current rate
    pub is_active: bool,
    /// User who published the rate
    pub created_by: String,
    /// When the rate took effect
    pub effective_from: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

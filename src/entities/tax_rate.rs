//! Tax rate entity - Percentage applied to the post-discount amount of a line.
//!
//! A rate with no category is the default; a rate with a category overrides the
//! default for products in that category.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tax rate database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tax_rates")]
pub struct Model {
    /// Unique identifier for the tax rate
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique display name (e.g., `"VAT"`)
    #[sea_orm(unique)]
    pub name: String,
    /// Percentage, e.g. `5` for 5%
    #[sea_orm(column_type = "Decimal(Some((7, 4)))")]
    pub percent: Decimal,
    /// Product category this rate is limited to, `None` for the default rate
    pub category: Option<String>,
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

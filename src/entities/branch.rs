//! Branch entity - A physical shop location.
//!
//! Branches own stock, treasury accounts and cash drawers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Branch database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "branches")]
pub struct Model {
    /// Unique identifier for the branch
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Short unique code (e.g., `"DXB-01"`)
    #[sea_orm(unique)]
    pub code: String,
    /// Soft delete flag - false hides the branch but keeps its history
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

/// Branch is only referenced by other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Branch business logic - Creating, finding and retiring shop locations.

use crate::{
    entities::{Branch, branch},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Retrieves all active branches ordered by code.
pub async fn get_all_active_branches(db: &DatabaseConnection) -> Result<Vec<branch::Model>> {
    Branch::find()
        .filter(branch::Column::IsActive.eq(true))
        .order_by_asc(branch::Column::Code)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a branch by id, including inactive ones.
pub async fn get_branch_by_id(
    db: &DatabaseConnection,
    branch_id: i64,
) -> Result<Option<branch::Model>> {
    Branch::find_by_id(branch_id).one(db).await.map_err(Into::into)
}

/// Finds an active branch by its code.
pub async fn get_branch_by_code<C>(db: &C, code: &str) -> Result<Option<branch::Model>>
where
    C: ConnectionTrait,
{
    Branch::find()
        .filter(branch::Column::Code.eq(code))
        .filter(branch::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads an active branch or fails with [`Error::EntityNotFound`].
pub async fn require_active_branch<C>(db: &C, branch_id: i64) -> Result<branch::Model>
where
    C: ConnectionTrait,
{
    Branch::find_by_id(branch_id)
        .one(db)
        .await?
        .filter(|b| b.is_active)
        .ok_or_else(|| Error::not_found("Branch", branch_id))
}

/// Creates a branch. Name and code are trimmed; the code must be unique.
pub async fn create_branch(
    db: &DatabaseConnection,
    name: String,
    code: String,
    user: &str,
) -> Result<branch::Model> {
    let name = name.trim();
    let code = code.trim();
    if name.is_empty() {
        return Err(Error::validation("Branch name cannot be empty"));
    }
    if code.is_empty() {
        return Err(Error::validation("Branch code cannot be empty"));
    }

    let taken = Branch::find()
        .filter(branch::Column::Code.eq(code))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::DuplicateEntity {
            entity: "Branch",
            key: code.to_string(),
        });
    }

    let now = chrono::Utc::now();
    let model = branch::ActiveModel {
        name: Set(name.to_string()),
        code: Set(code.to_string()),
        is_active: Set(true),
        created_by: Set(user.to_string()),
        modified_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(branch_id = model.id, code = %model.code, "Created branch");
    Ok(model)
}

/// Soft deletes a branch. Its history stays in place.
pub async fn soft_delete_branch(
    db: &DatabaseConnection,
    branch_id: i64,
    user: &str,
) -> Result<branch::Model> {
    let mut active: branch::ActiveModel = require_active_branch(db, branch_id).await?.into();
    active.is_active = Set(false);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

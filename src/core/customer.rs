//! Customer business logic.

use crate::{
    entities::{Customer, customer},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Finds a customer by id, including inactive ones.
pub async fn get_customer_by_id(
    db: &DatabaseConnection,
    customer_id: i64,
) -> Result<Option<customer::Model>> {
    Customer::find_by_id(customer_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads an active customer or fails with [`Error::EntityNotFound`].
pub async fn require_active_customer<C>(db: &C, customer_id: i64) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    Customer::find_by_id(customer_id)
        .one(db)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| Error::not_found("Customer", customer_id))
}

/// Creates a customer with a non-empty name.
pub async fn create_customer(
    db: &DatabaseConnection,
    name: String,
    phone: Option<String>,
    user: &str,
) -> Result<customer::Model> {
    if name.trim().is_empty() {
        return Err(Error::validation("Customer name cannot be empty"));
    }

    let now = chrono::Utc::now();
    customer::ActiveModel {
        name: Set(name.trim().to_string()),
        phone: Set(phone),
        is_active: Set(true),
        created_by: Set(user.to_string()),
        modified_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Soft deletes a customer; their orders keep pointing at the row.
pub async fn soft_delete_customer(
    db: &DatabaseConnection,
    customer_id: i64,
    user: &str,
) -> Result<customer::Model> {
    let mut active: customer::ActiveModel = require_active_customer(db, customer_id).await?.into();
    active.is_active = Set(false);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

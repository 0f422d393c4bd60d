//! Supplier business logic.

use crate::{
    entities::{Supplier, supplier},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Retrieves all active suppliers, ordered alphabetically by name.
pub async fn get_all_active_suppliers(db: &DatabaseConnection) -> Result<Vec<supplier::Model>> {
    Supplier::find()
        .filter(supplier::Column::IsActive.eq(true))
        .order_by_asc(supplier::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a supplier by id, including inactive ones.
pub async fn get_supplier_by_id(
    db: &DatabaseConnection,
    supplier_id: i64,
) -> Result<Option<supplier::Model>> {
    Supplier::find_by_id(supplier_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads an active supplier or fails with [`Error::EntityNotFound`].
pub async fn require_active_supplier<C>(db: &C, supplier_id: i64) -> Result<supplier::Model>
where
    C: ConnectionTrait,
{
    Supplier::find_by_id(supplier_id)
        .one(db)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| Error::not_found("Supplier", supplier_id))
}

/// Creates a supplier with a non-empty name.
pub async fn create_supplier(
    db: &DatabaseConnection,
    name: String,
    phone: Option<String>,
    user: &str,
) -> Result<supplier::Model> {
    if name.trim().is_empty() {
        return Err(Error::validation("Supplier name cannot be empty"));
    }

    let now = chrono::Utc::now();
    supplier::ActiveModel {
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

/// Soft deletes a supplier.
pub async fn soft_delete_supplier(
    db: &DatabaseConnection,
    supplier_id: i64,
    user: &str,
) -> Result<supplier::Model> {
    let mut active: supplier::ActiveModel = require_active_supplier(db, supplier_id).await?.into();
    active.is_active = Set(false);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_supplier_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;

        let refinery = create_supplier(
            &db,
            "Refinery".to_string(),
            Some("+971-4-000".to_string()),
            TEST_USER,
        )
        .await?;
        let atelier = create_test_supplier(&db, "Atelier").await?;
        assert_eq!(refinery.phone.as_deref(), Some("+971-4-000"));

        let all = get_all_active_suppliers(&db).await?;
        assert_eq!(all, vec![atelier.clone(), refinery.clone()]);

        soft_delete_supplier(&db, refinery.id, TEST_USER).await?;
        assert_eq!(get_all_active_suppliers(&db).await?, vec![atelier]);
        assert!(matches!(
            require_active_supplier(&db, refinery.id).await,
            Err(Error::EntityNotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_supplier_empty_name() -> Result<()> {
        let db = setup_test_db().await?;
        let result = create_supplier(&db, " ".to_string(), None, TEST_USER).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }
}

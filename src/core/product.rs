//! Product business logic - Handles all product-related operations.
//!
//! Products are finished pieces held at a branch. They are created `Available`, become
//! `Sold` through a sale and return to `Available` only through a return or a
//! cancelled sale. A sold product's fields are frozen; soft delete is the only change
//! still allowed.

use crate::{
    core::{branch::require_active_branch, supplier::require_active_supplier},
    entities::{Karat, MakingChargeKind, Product, ProductStatus, product},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, info};

/// Input for [`create_product`]
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Unique stock keeping unit
    pub sku: String,
    /// Display name
    pub name: String,
    /// Category used for tax lookup
    pub category: String,
    /// Gold purity
    pub karat: Karat,
    /// Grams, must be positive
    pub weight: Decimal,
    /// Making charge amount
    pub making_charge: Decimal,
    /// Fixed per piece or per gram
    pub making_charge_kind: MakingChargeKind,
    /// Supplier the piece came from
    pub supplier_id: Option<i64>,
    /// Branch holding the piece
    pub branch_id: i64,
}

/// Fields that may change on an unsold product. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    /// New display name
    pub name: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New making charge amount
    pub making_charge: Option<Decimal>,
    /// New making charge kind
    pub making_charge_kind: Option<MakingChargeKind>,
}

fn validate_name(name: &str, field: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation(format!("Product {field} cannot be empty")));
    }
    Ok(())
}

fn validate_making_charge(making_charge: Decimal) -> Result<()> {
    if making_charge < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Making charge cannot be negative: {making_charge}"
        )));
    }
    Ok(())
}

/// Retrieves a product by id, including sold and soft-deleted ones.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an active product by SKU.
pub async fn get_product_by_sku(
    db: &DatabaseConnection,
    sku: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Sku.eq(sku.trim()))
        .filter(product::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads an active product or fails with [`Error::EntityNotFound`].
pub async fn require_active_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| Error::not_found("Product", product_id))
}

/// Retrieves the active, unsold products of a branch ordered by SKU.
pub async fn list_available_products(
    db: &DatabaseConnection,
    branch_id: i64,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::BranchId.eq(branch_id))
        .filter(product::Column::IsActive.eq(true))
        .filter(product::Column::Status.eq(ProductStatus::Available))
        .order_by_asc(product::Column::Sku)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a new available product after validating its fields.
///
/// # Errors
/// Returns an error if:
/// - The SKU, name or category is empty
/// - The weight is not positive or the making charge is negative
/// - The SKU is already used
/// - The branch or supplier does not exist or is inactive
pub async fn create_product(
    db: &DatabaseConnection,
    new: NewProduct,
    user: &str,
) -> Result<product::Model> {
    validate_name(&new.sku, "SKU")?;
    validate_name(&new.name, "name")?;
    validate_name(&new.category, "category")?;
    if new.weight <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "Product weight must be positive: {}",
            new.weight
        )));
    }
    validate_making_charge(new.making_charge)?;

    let sku = new.sku.trim().to_string();
    let taken = Product::find()
        .filter(product::Column::Sku.eq(sku.as_str()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::DuplicateEntity {
            entity: "Product",
            key: sku,
        });
    }

    require_active_branch(db, new.branch_id).await?;
    if let Some(supplier_id) = new.supplier_id {
        require_active_supplier(db, supplier_id).await?;
    }

    let now = chrono::Utc::now();
    let model = product::ActiveModel {
        sku: Set(sku),
        name: Set(new.name.trim().to_string()),
        category: Set(new.category.trim().to_lowercase()),
        karat: Set(new.karat),
        weight: Set(new.weight),
        making_charge: Set(new.making_charge),
        making_charge_kind: Set(new.making_charge_kind),
        supplier_id: Set(new.supplier_id),
        branch_id: Set(new.branch_id),
        status: Set(ProductStatus::Available),
        is_active: Set(true),
        created_by: Set(user.to_string()),
        modified_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(product_id = model.id, sku = %model.sku, "Created product");
    Ok(model)
}

/// Updates descriptive and making charge fields of an unsold product.
///
/// # Errors
/// Returns [`Error::InvalidEntityState`] when the product has been sold.
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    update: ProductUpdate,
    user: &str,
) -> Result<product::Model> {
    let existing = require_active_product(db, product_id).await?;
    if existing.status == ProductStatus::Sold {
        return Err(Error::invalid_state(
            "Product",
            product_id,
            "sold products cannot be modified",
        ));
    }

    let mut active: product::ActiveModel = existing.into();
    if let Some(name) = update.name {
        validate_name(&name, "name")?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(category) = update.category {
        validate_name(&category, "category")?;
        active.category = Set(category.trim().to_lowercase());
    }
    if let Some(making_charge) = update.making_charge {
        validate_making_charge(making_charge)?;
        active.making_charge = Set(making_charge);
    }
    if let Some(kind) = update.making_charge_kind {
        active.making_charge_kind = Set(kind);
    }
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());

    active.update(db).await.map_err(Into::into)
}

/// Soft deletes a product, sold or not. Order history keeps referencing it.
pub async fn soft_delete_product(
    db: &DatabaseConnection,
    product_id: i64,
    user: &str,
) -> Result<product::Model> {
    let mut active: product::ActiveModel = require_active_product(db, product_id).await?.into();
    active.is_active = Set(false);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(db).await?;
    info!(product_id, "Soft deleted product");
    Ok(model)
}

/// Moves a product between stock states. Only order operations call this.
pub(crate) async fn set_product_status<C>(
    db: &C,
    product: product::Model,
    status: ProductStatus,
    user: &str,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    debug!(product_id = product.id, ?status, "Changing product status");
    let mut active: product::ActiveModel = product.into();
    active.status = Set(status);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

//! Tax rate business logic.
//!
//! The percentage applied to a product is the active rate for its category when one
//! exists, otherwise the active default rate (no category), otherwise zero.

use crate::{
    entities::{TaxRate, tax_rate},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Creates a tax rate. Names are unique; the percentage must be within 0..=100.
pub async fn create_tax_rate(
    db: &DatabaseConnection,
    name: String,
    percent: Decimal,
    category: Option<String>,
    user: &str,
) -> Result<tax_rate::Model> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("Tax rate name cannot be empty"));
    }
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(Error::validation(format!(
            "Tax percent must be between 0 and 100: {percent}"
        )));
    }
    let category = category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let taken = TaxRate::find()
        .filter(tax_rate::Column::Name.eq(name.as_str()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::DuplicateEntity {
            entity: "TaxRate",
            key: name,
        });
    }

    let now = chrono::Utc::now();
    let model = tax_rate::ActiveModel {
        name: Set(name),
        percent: Set(percent),
        category: Set(category),
        is_active: Set(true),
        created_by: Set(user.to_string()),
        modified_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(name = %model.name, percent = %model.percent, "Created tax rate");
    Ok(model)
}

/// Finds a tax rate by its unique name.
pub async fn get_tax_rate_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<tax_rate::Model>> {
    TaxRate::find()
        .filter(tax_rate::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all active tax rates ordered by name.
pub async fn list_active_tax_rates(db: &DatabaseConnection) -> Result<Vec<tax_rate::Model>> {
    TaxRate::find()
        .filter(tax_rate::Column::IsActive.eq(true))
        .order_by_asc(tax_rate::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retires a tax rate so it no longer applies to new orders.
pub async fn deactivate_tax_rate(
    db: &DatabaseConnection,
    tax_rate_id: i64,
    user: &str,
) -> Result<tax_rate::Model> {
    let rate = TaxRate::find_by_id(tax_rate_id)
        .one(db)
        .await?
        .filter(|r| r.is_active)
        .ok_or_else(|| Error::not_found("TaxRate", tax_rate_id))?;

    let mut active: tax_rate::ActiveModel = rate.into();
    active.is_active = Set(false);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Percentage to charge on a product of the given category.
pub async fn applicable_tax_percent<C>(db: &C, category: &str) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let specific = TaxRate::find()
        .filter(tax_rate::Column::IsActive.eq(true))
        .filter(tax_rate::Column::Category.eq(category))
        .order_by_desc(tax_rate::Column::Id)
        .one(db)
        .await?;
    if let Some(rate) = specific {
        return Ok(rate.percent);
    }

    let default = TaxRate::find()
        .filter(tax_rate::Column::IsActive.eq(true))
        .filter(tax_rate::Column::Category.is_null())
        .order_by_desc(tax_rate::Column::Id)
        .one(db)
        .await?;
    Ok(default.map_or(Decimal::ZERO, |rate| rate.percent))
}

//! Gold rate business logic - Publishing and reading per-gram rates by karat.
//!
//! Rates are append-only: publishing a new rate never edits an older row, so order
//! items can keep pointing at the exact row they were priced from.

use crate::{
    core::pricing::{derive_rate_from_24k, round_money},
    entities::{GoldRate, Karat, gold_rate},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Appends a new rate for a karat. The rate must be positive.
#[instrument(skip(db))]
pub async fn set_gold_rate<C>(
    db: &C,
    karat: Karat,
    rate_per_gram: Decimal,
    user: &str,
) -> Result<gold_rate::Model>
where
    C: ConnectionTrait,
{
    let rounded = round_money(rate_per_gram);
    if rounded <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "Gold rate must be positive: {rate_per_gram}"
        )));
    }

    let model = gold_rate::ActiveModel {
        karat: Set(karat),
        rate_per_gram: Set(rounded),
        is_active: Set(true),
        created_by: Set(user.to_string()),
        effective_from: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(%karat, rate = %model.rate_per_gram, "Published gold rate");
    Ok(model)
}

/// Publishes rates for every karat, derived from a 24K base rate by purity.
///
/// All rows are written in one transaction.
pub async fn set_rates_from_24k(
    db: &DatabaseConnection,
    base_rate: Decimal,
    user: &str,
) -> Result<Vec<gold_rate::Model>> {
    if base_rate <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "Gold rate must be positive: {base_rate}"
        )));
    }

    let txn = db.begin().await?;
    let mut published = Vec::with_capacity(Karat::ALL.len());
    for karat in Karat::ALL {
        let rate = derive_rate_from_24k(base_rate, karat);
        published.push(set_gold_rate(&txn, karat, rate, user).await?);
    }
    txn.commit().await?;

    Ok(published)
}

/// Returns the newest active rate for a karat, if one was ever published.
pub async fn get_current_rate<C>(db: &C, karat: Karat) -> Result<Option<gold_rate::Model>>
where
    C: ConnectionTrait,
{
    let rate = GoldRate::find()
        .filter(gold_rate::Column::Karat.eq(karat))
        .filter(gold_rate::Column::IsActive.eq(true))
        .order_by_desc(gold_rate::Column::Id)
        .one(db)
        .await?;
    debug!(%karat, found = rate.is_some(), "Looked up current gold rate");
    Ok(rate)
}

/// Like [`get_current_rate`] but a missing rate is an [`Error::EntityNotFound`].
pub async fn require_current_rate<C>(db: &C, karat: Karat) -> Result<gold_rate::Model>
where
    C: ConnectionTrait,
{
    get_current_rate(db, karat)
        .await?
        .ok_or_else(|| Error::not_found("GoldRate", karat))
}

/// Current rate of every karat that has one, lowest purity first.
pub async fn get_current_rates(db: &DatabaseConnection) -> Result<Vec<gold_rate::Model>> {
    let mut rates = Vec::new();
    for karat in Karat::ALL {
        if let Some(rate) = get_current_rate(db, karat).await? {
            rates.push(rate);
        }
    }
    Ok(rates)
}

/// Rate history for a karat, newest first.
pub async fn get_rate_history(
    db: &DatabaseConnection,
    karat: Karat,
    limit: u64,
) -> Result<Vec<gold_rate::Model>> {
    GoldRate::find()
        .filter(gold_rate::Column::Karat.eq(karat))
        .order_by_desc(gold_rate::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Withdraws a published rate so it is no longer used for pricing.
///
/// The row stays in place for the order items that reference it.
pub async fn deactivate_rate(
    db: &DatabaseConnection,
    rate_id: i64,
) -> Result<gold_rate::Model> {
    let rate = GoldRate::find_by_id(rate_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("GoldRate", rate_id))?;
    if !rate.is_active {
        return Err(Error::invalid_state("GoldRate", rate_id, "already inactive"));
    }

    let mut active: gold_rate::ActiveModel = rate.into();
    active.is_active = Set(false);
    active.update(db).await.map_err(Into::into)
}

//! Supplier gold balance business logic - Weight received versus weight paid for.
//!
//! Balances are kept per supplier and karat across all branches. They move together
//! with the raw gold ownership rows, so the received weight always equals the total
//! weight held at branches and the paid-for weight equals the owned weight.

use crate::{
    core::{
        pricing::{checked_add, checked_mul, round_money, round_weight},
        raw_gold::{apply_ownership_change, require_ownership},
        supplier::require_active_supplier,
    },
    entities::{Karat, RawGoldOwnership, SupplierGoldBalance, raw_gold_ownership, supplier_gold_balance},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument, warn};

/// Input for [`settle_in_gold`]
#[derive(Debug, Clone)]
pub struct SettleInGold {
    /// Supplier being settled with
    pub supplier_id: i64,
    /// Branch whose ownership row is settled
    pub branch_id: i64,
    /// Purity of the gold handed over
    pub karat: Karat,
    /// Grams handed over
    pub weight: Decimal,
    /// User recording the settlement
    pub user: String,
}

/// A supplier balance compared with the ownership rows behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceConsistency {
    /// Supplier checked
    pub supplier_id: i64,
    /// Karat checked
    pub karat: Karat,
    /// Received weight on the balance
    pub weight_received: Decimal,
    /// Paid-for weight on the balance
    pub weight_paid_for: Decimal,
    /// Sum of total weight over branches
    pub branch_total_weight: Decimal,
    /// Sum of owned weight over branches
    pub branch_owned_weight: Decimal,
}

impl BalanceConsistency {
    /// True when both weights match the branch sums
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.weight_received == self.branch_total_weight
            && self.weight_paid_for == self.branch_owned_weight
    }
}

async fn find_balance<C>(
    db: &C,
    supplier_id: i64,
    karat: Karat,
) -> Result<Option<supplier_gold_balance::Model>>
where
    C: ConnectionTrait,
{
    SupplierGoldBalance::find()
        .filter(supplier_gold_balance::Column::SupplierId.eq(supplier_id))
        .filter(supplier_gold_balance::Column::Karat.eq(karat))
        .filter(supplier_gold_balance::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Adds received weight, creating the balance on the first receipt.
pub(crate) async fn record_received<C>(
    db: &C,
    supplier_id: i64,
    karat: Karat,
    weight: Decimal,
    user: &str,
) -> Result<supplier_gold_balance::Model>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    match find_balance(db, supplier_id, karat).await? {
        Some(balance) => {
            let received = checked_add(balance.weight_received, weight, "Received weight")?;
            let mut active: supplier_gold_balance::ActiveModel = balance.into();
            active.weight_received = Set(received);
            active.modified_by = Set(Some(user.to_string()));
            active.updated_at = Set(now);
            active.update(db).await.map_err(Into::into)
        }
        None => supplier_gold_balance::ActiveModel {
            supplier_id: Set(supplier_id),
            karat: Set(karat),
            weight_received: Set(weight),
            weight_paid_for: Set(Decimal::ZERO),
            is_active: Set(true),
            created_by: Set(user.to_string()),
            modified_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(Into::into),
    }
}

/// Adds paid-for weight. The paid-for weight can never pass the received weight.
pub(crate) async fn record_paid_for<C>(
    db: &C,
    supplier_id: i64,
    karat: Karat,
    weight: Decimal,
    user: &str,
) -> Result<supplier_gold_balance::Model>
where
    C: ConnectionTrait,
{
    let balance = find_balance(db, supplier_id, karat).await?.ok_or_else(|| {
        Error::not_found("SupplierGoldBalance", format!("supplier {supplier_id} {karat}"))
    })?;

    let paid_for = balance.weight_paid_for + weight;
    if paid_for > balance.weight_received {
        return Err(Error::invalid_state(
            "SupplierGoldBalance",
            balance.id,
            format!(
                "paid-for weight {paid_for} would exceed received weight {}",
                balance.weight_received
            ),
        ));
    }

    let mut active: supplier_gold_balance::ActiveModel = balance.into();
    active.weight_paid_for = Set(paid_for);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Finds a supplier's balance for one karat.
pub async fn get_balance(
    db: &DatabaseConnection,
    supplier_id: i64,
    karat: Karat,
) -> Result<Option<supplier_gold_balance::Model>> {
    let balance = find_balance(db, supplier_id, karat).await?;
    debug!(supplier_id, %karat, found = balance.is_some(), "Looked up supplier gold balance");
    Ok(balance)
}

/// Every active balance of a supplier.
pub async fn list_balances_for_supplier(
    db: &DatabaseConnection,
    supplier_id: i64,
) -> Result<Vec<supplier_gold_balance::Model>> {
    SupplierGoldBalance::find()
        .filter(supplier_gold_balance::Column::SupplierId.eq(supplier_id))
        .filter(supplier_gold_balance::Column::IsActive.eq(true))
        .order_by_asc(supplier_gold_balance::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Pays part of a supplier's weight debt with gold instead of money.
///
/// The grams handed over become owned at the branch, and the outstanding cost of the
/// row drops in proportion. Handing over every unowned gram clears the outstanding cost.
///
/// # Errors
/// Returns [`Error::Validation`] when the weight is not positive or exceeds the unowned
/// weight of the supplier's gold at the branch.
#[instrument(skip(db))]
pub async fn settle_in_gold(
    db: &DatabaseConnection,
    settlement: SettleInGold,
) -> Result<supplier_gold_balance::Model> {
    let weight = round_weight(settlement.weight);
    if weight <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "Settlement weight must be positive: {}",
            settlement.weight
        )));
    }

    let txn = db.begin().await?;
    let supplier = require_active_supplier(&txn, settlement.supplier_id).await?;
    let row = require_ownership(&txn, supplier.id, settlement.branch_id, settlement.karat).await?;

    let unowned = row.unowned_weight();
    if weight > unowned {
        warn!(%weight, %unowned, "Rejected gold settlement above outstanding weight");
        return Err(Error::validation(format!(
            "Settlement of {weight}g exceeds the outstanding {unowned}g"
        )));
    }
    let cost_cleared = if weight == unowned {
        row.outstanding_cost
    } else {
        round_money(checked_mul(row.outstanding_cost, weight, "Settled cost")? / unowned)
            .min(row.outstanding_cost)
    };

    let row = apply_ownership_change(
        &txn,
        row,
        Decimal::ZERO,
        weight,
        -cost_cleared,
        &settlement.user,
    )
    .await?;
    let balance =
        record_paid_for(&txn, supplier.id, settlement.karat, weight, &settlement.user).await?;
    txn.commit().await?;

    info!(
        ownership_id = row.id,
        %weight,
        %cost_cleared,
        debt = %balance.outstanding_weight_debt(),
        "Settled supplier in gold"
    );
    Ok(balance)
}

/// Compares a supplier balance with the sum of its ownership rows across branches.
pub async fn check_consistency(
    db: &DatabaseConnection,
    supplier_id: i64,
    karat: Karat,
) -> Result<BalanceConsistency> {
    let balance = find_balance(db, supplier_id, karat).await?;
    let rows = RawGoldOwnership::find()
        .filter(raw_gold_ownership::Column::SupplierId.eq(supplier_id))
        .filter(raw_gold_ownership::Column::Karat.eq(karat))
        .filter(raw_gold_ownership::Column::IsActive.eq(true))
        .all(db)
        .await?;

    let (weight_received, weight_paid_for) = balance.map_or((Decimal::ZERO, Decimal::ZERO), |b| {
        (b.weight_received, b.weight_paid_for)
    });
    let consistency = BalanceConsistency {
        supplier_id,
        karat,
        weight_received,
        weight_paid_for,
        branch_total_weight: rows.iter().map(|r| r.total_weight).sum(),
        branch_owned_weight: rows.iter().map(|r| r.owned_weight).sum(),
    };
    if !consistency.is_consistent() {
        warn!(?consistency, "Supplier gold balance does not match ownership rows");
    }
    Ok(consistency)
}

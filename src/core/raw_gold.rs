//! Raw gold ownership business logic - Receipts from suppliers and paying them off.
//!
//! A receipt adds weight to the supplier/branch/karat row. Whatever was paid at receipt
//! buys owned weight at that receipt's cost per gram; the rest is outstanding cost.
//! Later payments convert outstanding cost into owned weight at the average outstanding
//! cost per gram of the row. Money always leaves through the branch treasury.

use crate::{
    core::{
        branch::require_active_branch,
        pricing::{checked_add, checked_mul, round_money, round_weight},
        supplier::require_active_supplier,
        supplier_balance,
        treasury::{PostTreasuryTransaction, post_in, require_account_for_branch},
    },
    entities::{
        Direction, Karat, RawGoldOwnership, TreasuryTransactionType, raw_gold_ownership,
        treasury_transaction,
    },
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument, warn};

/// Input for [`receive_raw_gold`]
#[derive(Debug, Clone)]
pub struct ReceiveRawGold {
    /// Supplier delivering the gold
    pub supplier_id: i64,
    /// Branch receiving it
    pub branch_id: i64,
    /// Purity delivered
    pub karat: Karat,
    /// Grams delivered
    pub weight: Decimal,
    /// Agreed price per gram
    pub cost_per_gram: Decimal,
    /// Amount paid on delivery, from the branch treasury
    pub amount_paid: Decimal,
    /// User recording the receipt
    pub user: String,
}

/// Input for [`pay_supplier`]
#[derive(Debug, Clone)]
pub struct PaySupplier {
    /// Supplier being paid
    pub supplier_id: i64,
    /// Branch paying
    pub branch_id: i64,
    /// Purity the payment is for
    pub karat: Karat,
    /// Amount paid
    pub amount: Decimal,
    /// User recording the payment
    pub user: String,
}

/// Result of [`pay_supplier`]
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierPaymentOutcome {
    /// Ownership row after the payment
    pub ownership: raw_gold_ownership::Model,
    /// Grams that became owned
    pub weight_settled: Decimal,
    /// Treasury debit for the payment
    pub treasury_transaction: treasury_transaction::Model,
}

/// `owned / total × 100` to two decimals, zero for an empty row.
#[must_use]
pub fn ownership_percentage(owned_weight: Decimal, total_weight: Decimal) -> Decimal {
    if total_weight.is_zero() {
        return Decimal::ZERO;
    }
    round_money(owned_weight / total_weight * Decimal::ONE_HUNDRED)
}

/// Checks the invariants of an ownership row.
///
/// # Errors
/// Returns [`Error::InvalidEntityState`] when owned weight is negative or above the total,
/// outstanding cost is negative, or the stored percentage is stale.
pub fn check_invariants(row: &raw_gold_ownership::Model) -> Result<()> {
    let problem = if row.owned_weight < Decimal::ZERO {
        Some(format!("owned weight {} is negative", row.owned_weight))
    } else if row.owned_weight > row.total_weight {
        Some(format!(
            "owned weight {} exceeds total weight {}",
            row.owned_weight, row.total_weight
        ))
    } else if row.outstanding_cost < Decimal::ZERO {
        Some(format!("outstanding cost {} is negative", row.outstanding_cost))
    } else if row.ownership_percentage != ownership_percentage(row.owned_weight, row.total_weight)
    {
        Some(format!(
            "ownership percentage {} does not match {}/{}",
            row.ownership_percentage, row.owned_weight, row.total_weight
        ))
    } else {
        None
    };

    match problem {
        Some(message) => {
            warn!(ownership_id = row.id, %message, "Raw gold ownership invariant violated");
            Err(Error::invalid_state("RawGoldOwnership", row.id, message))
        }
        None => Ok(()),
    }
}

pub(crate) async fn find_ownership<C>(
    db: &C,
    supplier_id: i64,
    branch_id: i64,
    karat: Karat,
) -> Result<Option<raw_gold_ownership::Model>>
where
    C: ConnectionTrait,
{
    RawGoldOwnership::find()
        .filter(raw_gold_ownership::Column::SupplierId.eq(supplier_id))
        .filter(raw_gold_ownership::Column::BranchId.eq(branch_id))
        .filter(raw_gold_ownership::Column::Karat.eq(karat))
        .filter(raw_gold_ownership::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

pub(crate) async fn require_ownership<C>(
    db: &C,
    supplier_id: i64,
    branch_id: i64,
    karat: Karat,
) -> Result<raw_gold_ownership::Model>
where
    C: ConnectionTrait,
{
    find_ownership(db, supplier_id, branch_id, karat)
        .await?
        .ok_or_else(|| {
            Error::not_found(
                "RawGoldOwnership",
                format!("supplier {supplier_id} branch {branch_id} {karat}"),
            )
        })
}

/// Applies weight and cost changes to an ownership row and stores it.
///
/// The invariants are checked on the new values before anything is written.
pub(crate) async fn apply_ownership_change<C>(
    db: &C,
    row: raw_gold_ownership::Model,
    added_weight: Decimal,
    owned_gain: Decimal,
    outstanding_change: Decimal,
    user: &str,
) -> Result<raw_gold_ownership::Model>
where
    C: ConnectionTrait,
{
    let total_weight = checked_add(row.total_weight, added_weight, "Total weight")?;
    let owned_weight = row.owned_weight + owned_gain;
    let outstanding_cost = checked_add(row.outstanding_cost, outstanding_change, "Outstanding cost")?;
    let updated = raw_gold_ownership::Model {
        total_weight,
        owned_weight,
        ownership_percentage: ownership_percentage(owned_weight, total_weight),
        outstanding_cost,
        modified_by: Some(user.to_string()),
        updated_at: chrono::Utc::now(),
        ..row
    };
    check_invariants(&updated)?;

    let active: raw_gold_ownership::ActiveModel = updated.into();
    active.reset_all().update(db).await.map_err(Into::into)
}

/// Records raw gold delivered by a supplier.
///
/// # Errors
/// Returns an error if:
/// - The weight is not positive, the cost or payment is negative, or the cost is too
///   large to represent
/// - The payment exceeds the cost of the delivery
/// - The supplier or branch does not exist or is inactive
/// - A payment is made and the branch has no treasury account or too little in it
#[instrument(skip(db))]
pub async fn receive_raw_gold(
    db: &DatabaseConnection,
    receipt: ReceiveRawGold,
) -> Result<raw_gold_ownership::Model> {
    let weight = round_weight(receipt.weight);
    if weight <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "Received weight must be positive: {}",
            receipt.weight
        )));
    }
    if receipt.cost_per_gram < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Cost per gram cannot be negative: {}",
            receipt.cost_per_gram
        )));
    }
    let amount_paid = round_money(receipt.amount_paid);
    if amount_paid < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Amount paid cannot be negative: {amount_paid}"
        )));
    }
    let cost = round_money(checked_mul(weight, receipt.cost_per_gram, "Receipt cost")?);
    if amount_paid > cost {
        return Err(Error::payment(format!(
            "Amount paid {amount_paid} exceeds the cost {cost}"
        )));
    }
    let owned_gain = if cost.is_zero() {
        weight
    } else {
        round_weight(checked_mul(weight, amount_paid, "Receipt payment")? / cost).min(weight)
    };

    let txn = db.begin().await?;
    let supplier = require_active_supplier(&txn, receipt.supplier_id).await?;
    require_active_branch(&txn, receipt.branch_id).await?;

    let row = match find_ownership(&txn, supplier.id, receipt.branch_id, receipt.karat).await? {
        Some(row) => row,
        None => {
            let now = chrono::Utc::now();
            raw_gold_ownership::ActiveModel {
                supplier_id: Set(supplier.id),
                branch_id: Set(receipt.branch_id),
                karat: Set(receipt.karat),
                total_weight: Set(Decimal::ZERO),
                owned_weight: Set(Decimal::ZERO),
                ownership_percentage: Set(Decimal::ZERO),
                outstanding_cost: Set(Decimal::ZERO),
                is_active: Set(true),
                created_by: Set(receipt.user.clone()),
                modified_by: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    let row = apply_ownership_change(
        &txn,
        row,
        weight,
        owned_gain,
        cost - amount_paid,
        &receipt.user,
    )
    .await?;

    if amount_paid > Decimal::ZERO {
        let account = require_account_for_branch(&txn, receipt.branch_id).await?;
        post_in(
            &txn,
            &PostTreasuryTransaction {
                account_id: account.id,
                direction: Direction::Debit,
                amount: amount_paid,
                transaction_type: TreasuryTransactionType::SupplierPayment,
                reference_type: Some("RawGoldOwnership".to_string()),
                reference_id: Some(row.id),
                description: format!("Paid {} on receipt of {weight}g {}", supplier.name, receipt.karat),
                user: receipt.user.clone(),
            },
        )
        .await?;
    }

    supplier_balance::record_received(&txn, supplier.id, receipt.karat, weight, &receipt.user)
        .await?;
    if owned_gain > Decimal::ZERO {
        supplier_balance::record_paid_for(&txn, supplier.id, receipt.karat, owned_gain, &receipt.user)
            .await?;
    }
    txn.commit().await?;

    info!(
        ownership_id = row.id,
        %weight,
        %owned_gain,
        outstanding = %row.outstanding_cost,
        "Received raw gold"
    );
    Ok(row)
}

/// Pays part of the outstanding cost of a supplier's gold at a branch.
///
/// The payment buys owned weight at the average outstanding cost per gram. Paying the
/// full outstanding cost settles every unowned gram.
///
/// # Errors
/// Returns an error if:
/// - The amount is not positive
/// - No ownership row exists for the supplier, branch and karat
/// - The amount exceeds the outstanding cost ([`Error::Payment`])
/// - The branch treasury cannot cover the payment
#[instrument(skip(db))]
pub async fn pay_supplier(
    db: &DatabaseConnection,
    payment: PaySupplier,
) -> Result<SupplierPaymentOutcome> {
    let amount = round_money(payment.amount);
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "Payment must be positive: {}",
            payment.amount
        )));
    }

    let txn = db.begin().await?;
    let supplier = require_active_supplier(&txn, payment.supplier_id).await?;
    let row = require_ownership(&txn, supplier.id, payment.branch_id, payment.karat).await?;
    if amount > row.outstanding_cost {
        return Err(Error::payment(format!(
            "Payment {amount} exceeds the outstanding cost {}",
            row.outstanding_cost
        )));
    }

    let unowned = row.unowned_weight();
    let weight_settled = if amount == row.outstanding_cost {
        unowned
    } else {
        round_weight(checked_mul(unowned, amount, "Supplier payment")? / row.outstanding_cost)
            .min(unowned)
    };

    let account = require_account_for_branch(&txn, payment.branch_id).await?;
    let treasury_transaction = post_in(
        &txn,
        &PostTreasuryTransaction {
            account_id: account.id,
            direction: Direction::Debit,
            amount,
            transaction_type: TreasuryTransactionType::SupplierPayment,
            reference_type: Some("RawGoldOwnership".to_string()),
            reference_id: Some(row.id),
            description: format!("Payment to {} for {} gold", supplier.name, payment.karat),
            user: payment.user.clone(),
        },
    )
    .await?;

    let ownership = apply_ownership_change(
        &txn,
        row,
        Decimal::ZERO,
        weight_settled,
        -amount,
        &payment.user,
    )
    .await?;
    if weight_settled > Decimal::ZERO {
        supplier_balance::record_paid_for(
            &txn,
            supplier.id,
            payment.karat,
            weight_settled,
            &payment.user,
        )
        .await?;
    }
    txn.commit().await?;

    info!(
        ownership_id = ownership.id,
        %amount,
        %weight_settled,
        percentage = %ownership.ownership_percentage,
        "Paid supplier"
    );
    Ok(SupplierPaymentOutcome {
        ownership,
        weight_settled,
        treasury_transaction,
    })
}

/// Finds the ownership row of a supplier's gold of one karat at a branch.
pub async fn get_ownership(
    db: &DatabaseConnection,
    supplier_id: i64,
    branch_id: i64,
    karat: Karat,
) -> Result<Option<raw_gold_ownership::Model>> {
    let row = find_ownership(db, supplier_id, branch_id, karat).await?;
    debug!(supplier_id, branch_id, %karat, found = row.is_some(), "Looked up raw gold ownership");
    Ok(row)
}

/// Every active ownership row of a supplier, across branches and karats.
pub async fn list_ownership_for_supplier(
    db: &DatabaseConnection,
    supplier_id: i64,
) -> Result<Vec<raw_gold_ownership::Model>> {
    RawGoldOwnership::find()
        .filter(raw_gold_ownership::Column::SupplierId.eq(supplier_id))
        .filter(raw_gold_ownership::Column::IsActive.eq(true))
        .order_by_asc(raw_gold_ownership::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{supplier_balance::get_balance, treasury};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    struct Fixture {
        db: DatabaseConnection,
        supplier_id: i64,
        branch_id: i64,
        account_id: i64,
    }

    async fn setup() -> Result<Fixture> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;
        let supplier = create_test_supplier(&db, "Gulf Bullion").await?;
        let account = create_test_treasury(&db, branch.id, "50000").await?;
        Ok(Fixture {
            db,
            supplier_id: supplier.id,
            branch_id: branch.id,
            account_id: account.id,
        })
    }

    fn receipt(f: &Fixture, weight: &str, cost_per_gram: &str, paid: &str) -> ReceiveRawGold {
        ReceiveRawGold {
            supplier_id: f.supplier_id,
            branch_id: f.branch_id,
            karat: Karat::K21,
            weight: dec(weight),
            cost_per_gram: dec(cost_per_gram),
            amount_paid: dec(paid),
            user: TEST_USER.to_string(),
        }
    }

    fn payment(f: &Fixture, amount: &str) -> PaySupplier {
        PaySupplier {
            supplier_id: f.supplier_id,
            branch_id: f.branch_id,
            karat: Karat::K21,
            amount: dec(amount),
            user: TEST_USER.to_string(),
        }
    }

    fn row(total: &str, owned: &str, pct: &str, outstanding: &str) -> raw_gold_ownership::Model {
        raw_gold_ownership::Model {
            id: 1,
            supplier_id: 1,
            branch_id: 1,
            karat: Karat::K21,
            total_weight: dec(total),
            owned_weight: dec(owned),
            ownership_percentage: dec(pct),
            outstanding_cost: dec(outstanding),
            is_active: true,
            created_by: TEST_USER.to_string(),
            modified_by: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_ownership_percentage() {
        assert_eq!(ownership_percentage(dec("25"), dec("100")), dec("25"));
        assert_eq!(ownership_percentage(dec("25"), dec("150")), dec("16.67"));
        assert_eq!(ownership_percentage(dec("0"), dec("0")), Decimal::ZERO);
        assert_eq!(ownership_percentage(dec("7"), dec("7")), dec("100"));
    }

    #[test]
    fn test_check_invariants() {
        assert!(check_invariants(&row("100", "25", "25", "15000")).is_ok());
        assert!(check_invariants(&row("0", "0", "0", "0")).is_ok());

        for bad in [
            row("100", "101", "101", "0"),
            row("100", "-1", "-1", "0"),
            row("100", "25", "25", "-1"),
            row("100", "25", "30", "0"),
        ] {
            assert!(matches!(
                check_invariants(&bad),
                Err(Error::InvalidEntityState { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_receive_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let f = Fixture {
            db,
            supplier_id: 1,
            branch_id: 1,
            account_id: 1,
        };

        let result = receive_raw_gold(&f.db, receipt(&f, "0", "200", "0")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = receive_raw_gold(&f.db, receipt(&f, "10", "-1", "0")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = receive_raw_gold(&f.db, receipt(&f, "10", "200", "2000.01")).await;
        assert!(matches!(result, Err(Error::Payment { .. })));

        // Cost too large to represent
        let huge = receipt(&f, "1000000000000000", "1000000000000000", "0");
        let result = receive_raw_gold(&f.db, huge).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_receive_partially_paid() -> Result<()> {
        let f = setup().await?;

        let row = receive_raw_gold(&f.db, receipt(&f, "100", "200", "5000")).await?;
        assert_eq!(row.total_weight, dec("100"));
        assert_eq!(row.owned_weight, dec("25"));
        assert_eq!(row.ownership_percentage, dec("25"));
        assert_eq!(row.outstanding_cost, dec("15000"));
        assert_eq!(row.unowned_weight(), dec("75"));

        let account = treasury::get_account(&f.db, f.account_id).await?.unwrap();
        assert_eq!(account.balance, dec("45000"));

        let balance = get_balance(&f.db, f.supplier_id, Karat::K21).await?.unwrap();
        assert_eq!(balance.weight_received, dec("100"));
        assert_eq!(balance.weight_paid_for, dec("25"));
        assert_eq!(balance.outstanding_weight_debt(), dec("75"));

        Ok(())
    }

    #[tokio::test]
    async fn test_second_receipt_accumulates() -> Result<()> {
        let f = setup().await?;
        receive_raw_gold(&f.db, receipt(&f, "100", "200", "5000")).await?;

        let row = receive_raw_gold(&f.db, receipt(&f, "50", "300", "0")).await?;
        assert_eq!(row.total_weight, dec("150"));
        assert_eq!(row.owned_weight, dec("25"));
        assert_eq!(row.ownership_percentage, dec("16.67"));
        assert_eq!(row.outstanding_cost, dec("30000"));

        let rows = list_ownership_for_supplier(&f.db, f.supplier_id).await?;
        assert_eq!(rows.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_pay_supplier_converts_at_average_cost() -> Result<()> {
        let f = setup().await?;
        receive_raw_gold(&f.db, receipt(&f, "100", "200", "5000")).await?;
        receive_raw_gold(&f.db, receipt(&f, "50", "300", "0")).await?;

        // 125g unowned for 30000 outstanding
        let outcome = pay_supplier(&f.db, payment(&f, "10000")).await?;
        assert_eq!(outcome.weight_settled, dec("41.667"));
        assert_eq!(outcome.ownership.owned_weight, dec("66.667"));
        assert_eq!(outcome.ownership.ownership_percentage, dec("44.44"));
        assert_eq!(outcome.ownership.outstanding_cost, dec("20000"));
        assert_eq!(outcome.treasury_transaction.direction, Direction::Debit);
        assert_eq!(
            outcome.treasury_transaction.transaction_type,
            TreasuryTransactionType::SupplierPayment
        );

        // Paying the rest settles every remaining gram
        let outcome = pay_supplier(&f.db, payment(&f, "20000")).await?;
        assert_eq!(outcome.weight_settled, dec("83.333"));
        assert_eq!(outcome.ownership.owned_weight, dec("150"));
        assert_eq!(outcome.ownership.ownership_percentage, dec("100"));
        assert_eq!(outcome.ownership.outstanding_cost, Decimal::ZERO);

        let balance = get_balance(&f.db, f.supplier_id, Karat::K21).await?.unwrap();
        assert_eq!(balance.outstanding_weight_debt(), Decimal::ZERO);

        let account = treasury::get_account(&f.db, f.account_id).await?.unwrap();
        assert_eq!(account.balance, dec("15000"));

        Ok(())
    }

    #[tokio::test]
    async fn test_overpayment_is_rejected() -> Result<()> {
        let f = setup().await?;
        receive_raw_gold(&f.db, receipt(&f, "10", "200", "0")).await?;

        let result = pay_supplier(&f.db, payment(&f, "2000.01")).await;
        assert!(matches!(result, Err(Error::Payment { .. })));

        let row = get_ownership(&f.db, f.supplier_id, f.branch_id, Karat::K21)
            .await?
            .unwrap();
        assert_eq!(row.outstanding_cost, dec("2000"));
        assert_eq!(row.owned_weight, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_payment_needs_treasury_funds() -> Result<()> {
        let f = setup().await?;
        receive_raw_gold(&f.db, receipt(&f, "1000", "200", "0")).await?;

        let result = pay_supplier(&f.db, payment(&f, "60000")).await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        let row = get_ownership(&f.db, f.supplier_id, f.branch_id, Karat::K21)
            .await?
            .unwrap();
        assert_eq!(row.owned_weight, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_supplier_payment_cannot_be_reversed_in_treasury() -> Result<()> {
        let f = setup().await?;
        receive_raw_gold(&f.db, receipt(&f, "10", "100", "0")).await?;
        let outcome = pay_supplier(&f.db, payment(&f, "500")).await?;

        let result =
            treasury::reverse_transaction(&f.db, outcome.treasury_transaction.id, "auditor").await;
        assert!(matches!(result, Err(Error::InvalidEntityState { .. })));

        // Treasury and ownership still agree on the payment
        let account = treasury::get_account(&f.db, f.account_id).await?.unwrap();
        assert_eq!(account.balance, dec("49500"));
        let row = get_ownership(&f.db, f.supplier_id, f.branch_id, Karat::K21)
            .await?
            .unwrap();
        assert_eq!(row.owned_weight, dec("5"));
        assert_eq!(row.outstanding_cost, dec("500"));

        Ok(())
    }

    #[tokio::test]
    async fn test_pay_without_receipt() -> Result<()> {
        let f = setup().await?;

        let result = pay_supplier(&f.db, payment(&f, "100")).await;
        assert!(matches!(
            result,
            Err(Error::EntityNotFound { entity: "RawGoldOwnership", .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_unpriced_receipt_is_owned_outright() -> Result<()> {
        let f = setup().await?;

        let row = receive_raw_gold(&f.db, receipt(&f, "12.5", "0", "0")).await?;
        assert_eq!(row.owned_weight, dec("12.5"));
        assert_eq!(row.ownership_percentage, dec("100"));
        assert_eq!(row.outstanding_cost, Decimal::ZERO);

        Ok(())
    }
}

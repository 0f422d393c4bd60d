//! Cash drawer business logic - Daily open, close and settlement of a branch till.
//!
//! A drawer goes `Open → Closed → Settled`. The expected closing amount is the opening
//! float plus the net cash of the posted financial transactions of that branch and
//! business date. The float is drawn from the branch treasury when the drawer opens and
//! settling hands the counted cash back, so the treasury only grows by the day's takings.

use crate::{
    core::{
        branch::require_active_branch,
        pricing::round_money,
        treasury::{PostTreasuryTransaction, post_in, require_account_for_branch},
    },
    entities::{
        CashDrawerBalance, Direction, DrawerStatus, FinancialStatus, FinancialTransaction,
        TreasuryTransactionType, cash_drawer_balance, financial_transaction, treasury_transaction,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Result of [`settle_drawer`]
#[derive(Debug, Clone, PartialEq)]
pub struct DrawerSettlement {
    /// Drawer after settlement
    pub drawer: cash_drawer_balance::Model,
    /// Treasury credit for the counted cash; `None` when the drawer was empty
    pub treasury_transaction: Option<treasury_transaction::Model>,
}

async fn require_drawer<C>(db: &C, drawer_id: i64) -> Result<cash_drawer_balance::Model>
where
    C: ConnectionTrait,
{
    CashDrawerBalance::find_by_id(drawer_id)
        .one(db)
        .await?
        .filter(|d| d.is_active)
        .ok_or_else(|| Error::not_found("CashDrawerBalance", drawer_id))
}

/// Opens the drawer of a branch for a business date.
///
/// A positive float is debited from the branch treasury in the same transaction.
///
/// # Errors
/// Returns [`Error::DuplicateEntity`] when the branch already has a drawer for that date,
/// [`Error::EntityNotFound`] when a float is requested and the branch has no treasury
/// account, and [`Error::InsufficientFunds`] when the treasury cannot cover the float.
#[instrument(skip(db))]
pub async fn open_drawer(
    db: &DatabaseConnection,
    branch_id: i64,
    business_date: NaiveDate,
    opening_balance: Decimal,
    user: &str,
) -> Result<cash_drawer_balance::Model> {
    let opening_balance = round_money(opening_balance);
    if opening_balance < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Opening balance cannot be negative: {opening_balance}"
        )));
    }

    let txn = db.begin().await?;
    require_active_branch(&txn, branch_id).await?;
    if get_drawer_for_day(&txn, branch_id, business_date)
        .await?
        .is_some()
    {
        return Err(Error::DuplicateEntity {
            entity: "CashDrawerBalance",
            key: format!("branch {branch_id} on {business_date}"),
        });
    }

    let now = chrono::Utc::now();
    let drawer = cash_drawer_balance::ActiveModel {
        branch_id: Set(branch_id),
        business_date: Set(business_date),
        opening_balance: Set(opening_balance),
        expected_closing_balance: Set(None),
        actual_closing_balance: Set(None),
        status: Set(DrawerStatus::Open),
        opened_by: Set(user.to_string()),
        closed_by: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if opening_balance > Decimal::ZERO {
        let account = require_account_for_branch(&txn, branch_id).await?;
        post_in(
            &txn,
            &PostTreasuryTransaction {
                account_id: account.id,
                direction: Direction::Debit,
                amount: opening_balance,
                transaction_type: TreasuryTransactionType::DrawerFloat,
                reference_type: Some("CashDrawerBalance".to_string()),
                reference_id: Some(drawer.id),
                description: format!("Drawer float for {business_date}"),
                user: user.to_string(),
            },
        )
        .await?;
    }
    txn.commit().await?;

    info!(drawer_id = drawer.id, branch_id, %business_date, %opening_balance, "Opened cash drawer");
    Ok(drawer)
}

/// Finds a drawer by id.
pub async fn get_drawer(
    db: &DatabaseConnection,
    drawer_id: i64,
) -> Result<Option<cash_drawer_balance::Model>> {
    CashDrawerBalance::find_by_id(drawer_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the drawer of a branch for a business date.
pub async fn get_drawer_for_day<C>(
    db: &C,
    branch_id: i64,
    business_date: NaiveDate,
) -> Result<Option<cash_drawer_balance::Model>>
where
    C: ConnectionTrait,
{
    CashDrawerBalance::find()
        .filter(cash_drawer_balance::Column::BranchId.eq(branch_id))
        .filter(cash_drawer_balance::Column::BusinessDate.eq(business_date))
        .filter(cash_drawer_balance::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Opening float plus the net cash posted for the drawer's branch and date.
///
/// Cash sales and repairs add their total, cash refunds take it out. Voided transactions
/// and other tenders are ignored.
pub async fn expected_closing<C>(db: &C, drawer: &cash_drawer_balance::Model) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let transactions = FinancialTransaction::find()
        .filter(financial_transaction::Column::BranchId.eq(drawer.branch_id))
        .filter(financial_transaction::Column::BusinessDate.eq(drawer.business_date))
        .filter(financial_transaction::Column::Status.eq(FinancialStatus::Posted))
        .all(db)
        .await?;

    let net_cash: Decimal = transactions
        .iter()
        .map(financial_transaction::Model::cash_effect)
        .sum();
    Ok(round_money(drawer.opening_balance + net_cash))
}

/// Counts an open drawer and records the expected and actual closing amounts.
///
/// # Errors
/// Returns [`Error::InvalidEntityState`] when the drawer is not open.
#[instrument(skip(db))]
pub async fn close_drawer(
    db: &DatabaseConnection,
    drawer_id: i64,
    actual_closing_balance: Decimal,
    user: &str,
) -> Result<cash_drawer_balance::Model> {
    let actual = round_money(actual_closing_balance);
    if actual < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Counted cash cannot be negative: {actual}"
        )));
    }

    let txn = db.begin().await?;
    let drawer = require_drawer(&txn, drawer_id).await?;
    if drawer.status != DrawerStatus::Open {
        return Err(Error::invalid_state(
            "CashDrawerBalance",
            drawer_id,
            format!("cannot close a {:?} drawer", drawer.status),
        ));
    }
    let expected = expected_closing(&txn, &drawer).await?;

    let mut active: cash_drawer_balance::ActiveModel = drawer.into();
    active.expected_closing_balance = Set(Some(expected));
    active.actual_closing_balance = Set(Some(actual));
    active.status = Set(DrawerStatus::Closed);
    active.closed_by = Set(Some(user.to_string()));
    active.updated_at = Set(chrono::Utc::now());
    let drawer = active.update(&txn).await?;
    txn.commit().await?;

    let over_short = actual - expected;
    if over_short.is_zero() {
        info!(drawer_id, %expected, "Closed cash drawer");
    } else {
        warn!(drawer_id, %expected, %actual, %over_short, "Closed cash drawer with a difference");
    }
    Ok(drawer)
}

/// Hands the counted cash of a closed drawer over to the branch treasury.
///
/// # Errors
/// Returns [`Error::InvalidEntityState`] when the drawer is not closed, and
/// [`Error::EntityNotFound`] when the branch has no treasury account.
#[instrument(skip(db))]
pub async fn settle_drawer(
    db: &DatabaseConnection,
    drawer_id: i64,
    user: &str,
) -> Result<DrawerSettlement> {
    let txn = db.begin().await?;
    let drawer = require_drawer(&txn, drawer_id).await?;
    if drawer.status != DrawerStatus::Closed {
        return Err(Error::invalid_state(
            "CashDrawerBalance",
            drawer_id,
            format!("cannot settle a {:?} drawer", drawer.status),
        ));
    }
    let counted = drawer.actual_closing_balance.unwrap_or(Decimal::ZERO);

    let treasury_transaction = if counted > Decimal::ZERO {
        let account = require_account_for_branch(&txn, drawer.branch_id).await?;
        Some(
            post_in(
                &txn,
                &PostTreasuryTransaction {
                    account_id: account.id,
                    direction: Direction::Credit,
                    amount: counted,
                    transaction_type: TreasuryTransactionType::DrawerSettlement,
                    reference_type: Some("CashDrawerBalance".to_string()),
                    reference_id: Some(drawer.id),
                    description: format!("Drawer settlement for {}", drawer.business_date),
                    user: user.to_string(),
                },
            )
            .await?,
        )
    } else {
        None
    };

    let mut active: cash_drawer_balance::ActiveModel = drawer.into();
    active.status = Set(DrawerStatus::Settled);
    active.updated_at = Set(chrono::Utc::now());
    let drawer = active.update(&txn).await?;
    txn.commit().await?;

    info!(drawer_id, %counted, "Settled cash drawer");
    Ok(DrawerSettlement {
        drawer,
        treasury_transaction,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{
        order::{self, NewRepair, NewReturn, NewSale, Payment, SaleLine},
        treasury,
    };
    use crate::entities::{Karat, PaymentMethod};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn sale(branch_id: i64, product_id: i64, method: PaymentMethod, amount: &str) -> NewSale {
        NewSale {
            branch_id,
            customer_id: None,
            lines: vec![SaleLine {
                product_id,
                discount: Decimal::ZERO,
            }],
            payment: Payment {
                method,
                amount: dec(amount),
            },
            business_date: test_date(),
            user: TEST_USER.to_string(),
        }
    }

    fn labor_repair(branch_id: i64, business_date: NaiveDate) -> NewRepair {
        NewRepair {
            branch_id,
            customer_id: None,
            description: "Clasp repair".to_string(),
            karat: Karat::K21,
            added_weight: Decimal::ZERO,
            labor_charge: dec("80"),
            discount: Decimal::ZERO,
            payment: Payment {
                method: PaymentMethod::Cash,
                amount: dec("100"),
            },
            business_date,
            user: TEST_USER.to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_drawer_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = open_drawer(&db, 1, test_date(), dec("-10"), TEST_USER).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = close_drawer(&db, 1, dec("-0.01"), TEST_USER).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_one_drawer_per_day() -> Result<()> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;
        create_test_treasury(&db, branch.id, "2000").await?;

        let drawer = open_drawer(&db, branch.id, test_date(), dec("500"), TEST_USER).await?;
        assert_eq!(drawer.status, DrawerStatus::Open);
        assert_eq!(drawer.cash_over_short(), None);

        let result = open_drawer(&db, branch.id, test_date(), dec("500"), TEST_USER).await;
        assert!(matches!(result, Err(Error::DuplicateEntity { .. })));

        let next_day = test_date().succ_opt().unwrap();
        open_drawer(&db, branch.id, next_day, dec("500"), TEST_USER).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_expected_closing_counts_only_posted_cash() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        create_test_treasury(&db, branch.id, "1000").await?;
        let drawer = open_drawer(&db, branch.id, test_date(), dec("500"), TEST_USER).await?;

        // Cash sale +2730
        order::create_sale(&db, sale(branch.id, products[0].id, PaymentMethod::Cash, "3000"))
            .await?;
        // Card sale, no cash
        let card = order::create_sale(
            &db,
            sale(branch.id, products[1].id, PaymentMethod::Card, "1417.50"),
        )
        .await?;
        // Cash repair +84 (80 labor, 5% tax)
        order::create_repair(&db, labor_repair(branch.id, test_date())).await?;
        // Repair on another day is not counted
        order::create_repair(&db, labor_repair(branch.id, test_date().succ_opt().unwrap())).await?;
        // Card sale refunded in cash −1417.50
        order::create_return(
            &db,
            NewReturn {
                original_order_id: card.order.id,
                product_ids: vec![products[1].id],
                payment_method: PaymentMethod::Cash,
                business_date: test_date(),
                reason: None,
                user: TEST_USER.to_string(),
            },
        )
        .await?;
        // Cancelled cash repair is not counted
        let cancelled = order::create_repair(&db, labor_repair(branch.id, test_date())).await?;
        order::cancel_order(&db, cancelled.order.id, TEST_USER).await?;

        assert_eq!(expected_closing(&db, &drawer).await?, dec("1896.50"));

        let closed = close_drawer(&db, drawer.id, dec("1890"), "cashier").await?;
        assert_eq!(closed.status, DrawerStatus::Closed);
        assert_eq!(closed.expected_closing_balance, Some(dec("1896.50")));
        assert_eq!(closed.cash_over_short(), Some(dec("-6.50")));
        assert_eq!(closed.closed_by.as_deref(), Some("cashier"));

        Ok(())
    }

    #[tokio::test]
    async fn test_settle_drawer_credits_treasury() -> Result<()> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;
        let account = create_test_treasury(&db, branch.id, "1000").await?;
        let drawer = open_drawer(&db, branch.id, test_date(), dec("300"), TEST_USER).await?;
        let account = treasury::get_account(&db, account.id).await?.unwrap();
        assert_eq!(account.balance, dec("700"));

        let result = settle_drawer(&db, drawer.id, TEST_USER).await;
        assert!(matches!(result, Err(Error::InvalidEntityState { .. })));

        close_drawer(&db, drawer.id, dec("450"), TEST_USER).await?;
        let settlement = settle_drawer(&db, drawer.id, TEST_USER).await?;
        assert_eq!(settlement.drawer.status, DrawerStatus::Settled);
        let credit = settlement.treasury_transaction.unwrap();
        assert_eq!(credit.direction, Direction::Credit);
        assert_eq!(credit.transaction_type, TreasuryTransactionType::DrawerSettlement);
        assert_eq!(credit.reference_id, Some(drawer.id));

        assert_eq!(credit.amount, dec("450"));

        // The float comes back with the 150 taken during the day
        let account = treasury::get_account(&db, account.id).await?.unwrap();
        assert_eq!(account.balance, dec("1150"));
        assert!(treasury::reconcile(&db, account.id).await?.is_balanced());

        let again = settle_drawer(&db, drawer.id, TEST_USER).await;
        assert!(matches!(again, Err(Error::InvalidEntityState { .. })));
        let reclose = close_drawer(&db, drawer.id, dec("300"), TEST_USER).await;
        assert!(matches!(reclose, Err(Error::InvalidEntityState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_quiet_days_leave_treasury_unchanged() -> Result<()> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;
        let account = create_test_treasury(&db, branch.id, "1000").await?;

        let mut day = test_date();
        for _ in 0..3 {
            let drawer = open_drawer(&db, branch.id, day, dec("300"), TEST_USER).await?;
            close_drawer(&db, drawer.id, dec("300"), TEST_USER).await?;
            settle_drawer(&db, drawer.id, TEST_USER).await?;
            day = day.succ_opt().unwrap();
        }

        let account = treasury::get_account(&db, account.id).await?.unwrap();
        assert_eq!(account.balance, dec("1000"));
        let history = treasury::get_transactions(&db, account.id).await?;
        let floats = history
            .iter()
            .filter(|t| t.transaction_type == TreasuryTransactionType::DrawerFloat)
            .count();
        assert_eq!(floats, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_open_drawer_float_needs_treasury_funds() -> Result<()> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;

        let result = open_drawer(&db, branch.id, test_date(), dec("300"), TEST_USER).await;
        assert!(matches!(result, Err(Error::EntityNotFound { .. })));

        let account = create_test_treasury(&db, branch.id, "200").await?;
        let result = open_drawer(&db, branch.id, test_date(), dec("300"), TEST_USER).await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        // Nothing was kept from the failed attempts
        assert!(get_drawer_for_day(&db, branch.id, test_date()).await?.is_none());
        let account = treasury::get_account(&db, account.id).await?.unwrap();
        assert_eq!(account.balance, dec("200"));

        Ok(())
    }

    #[tokio::test]
    async fn test_settle_empty_drawer_posts_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;
        let drawer = open_drawer(&db, branch.id, test_date(), Decimal::ZERO, TEST_USER).await?;

        close_drawer(&db, drawer.id, Decimal::ZERO, TEST_USER).await?;
        let settlement = settle_drawer(&db, drawer.id, TEST_USER).await?;
        assert!(settlement.treasury_transaction.is_none());
        assert_eq!(
            get_drawer(&db, drawer.id).await?.unwrap().status,
            DrawerStatus::Settled
        );

        Ok(())
    }
}

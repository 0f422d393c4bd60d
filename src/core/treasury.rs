//! Treasury business logic - Branch cash ledgers.
//!
//! A treasury account's balance only changes together with an appended treasury
//! transaction in the same database transaction. Transactions are never edited or
//! deleted; mistakes are undone with a reversing entry.

use crate::{
    core::{branch::require_active_branch, pricing::round_money},
    entities::{
        Direction, TreasuryAccount, TreasuryTransaction, TreasuryTransactionType,
        treasury_account, treasury_transaction,
    },
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Input for [`post_transaction`]
#[derive(Debug, Clone)]
pub struct PostTreasuryTransaction {
    /// Account to move
    pub account_id: i64,
    /// Credit adds, debit subtracts
    pub direction: Direction,
    /// Positive amount
    pub amount: Decimal,
    /// Reason for the movement
    pub transaction_type: TreasuryTransactionType,
    /// Kind of row the movement relates to
    pub reference_type: Option<String>,
    /// Id of the related row
    pub reference_id: Option<i64>,
    /// Human-readable description
    pub description: String,
    /// User posting the movement
    pub user: String,
}

/// Stored balance compared with the signed sum of the account's transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Account checked
    pub account_id: i64,
    /// Balance column on the account
    pub stored_balance: Decimal,
    /// Sum of signed transaction amounts
    pub computed_balance: Decimal,
    /// `stored − computed`
    pub difference: Decimal,
    /// Number of transactions summed
    pub transaction_count: usize,
    /// Whether every `balance_after` matches the running sum
    pub running_balances_match: bool,
}

impl Reconciliation {
    /// True when the stored balance and history agree
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.difference.is_zero() && self.running_balances_match
    }
}

/// Finds a treasury account by id.
pub async fn get_account(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<Option<treasury_account::Model>> {
    TreasuryAccount::find_by_id(account_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the active treasury account of a branch.
pub async fn get_account_for_branch<C>(
    db: &C,
    branch_id: i64,
) -> Result<Option<treasury_account::Model>>
where
    C: ConnectionTrait,
{
    TreasuryAccount::find()
        .filter(treasury_account::Column::BranchId.eq(branch_id))
        .filter(treasury_account::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_account_for_branch`] but a missing account is an error.
pub async fn require_account_for_branch<C>(
    db: &C,
    branch_id: i64,
) -> Result<treasury_account::Model>
where
    C: ConnectionTrait,
{
    get_account_for_branch(db, branch_id)
        .await?
        .ok_or_else(|| Error::not_found("TreasuryAccount", format!("branch {branch_id}")))
}

/// Opens the treasury account of a branch.
///
/// A positive opening balance is recorded as an opening credit so that the history
/// always sums to the balance.
pub async fn open_account(
    db: &DatabaseConnection,
    branch_id: i64,
    opening_balance: Decimal,
    currency: &str,
    user: &str,
) -> Result<treasury_account::Model> {
    let opening_balance = round_money(opening_balance);
    if opening_balance < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Opening balance cannot be negative: {opening_balance}"
        )));
    }
    let currency = currency.trim().to_uppercase();
    if currency.len() != 3 {
        return Err(Error::validation(format!("Invalid currency code: {currency}")));
    }

    let txn = db.begin().await?;
    require_active_branch(&txn, branch_id).await?;

    let existing = TreasuryAccount::find()
        .filter(treasury_account::Column::BranchId.eq(branch_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::DuplicateEntity {
            entity: "TreasuryAccount",
            key: format!("branch {branch_id}"),
        });
    }

    let now = chrono::Utc::now();
    let account = treasury_account::ActiveModel {
        branch_id: Set(branch_id),
        balance: Set(Decimal::ZERO),
        currency: Set(currency),
        is_active: Set(true),
        created_by: Set(user.to_string()),
        modified_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let account = if opening_balance > Decimal::ZERO {
        let request = PostTreasuryTransaction {
            account_id: account.id,
            direction: Direction::Credit,
            amount: opening_balance,
            transaction_type: TreasuryTransactionType::Opening,
            reference_type: None,
            reference_id: None,
            description: "Opening balance".to_string(),
            user: user.to_string(),
        };
        post_entry(&txn, &request, None).await?.0
    } else {
        account
    };

    txn.commit().await?;
    info!(account_id = account.id, branch_id, balance = %account.balance, "Opened treasury account");
    Ok(account)
}

/// Applies one movement to an account inside the caller's transaction.
///
/// Returns the updated account and the appended movement.
async fn post_entry<C>(
    db: &C,
    request: &PostTreasuryTransaction,
    reverses_id: Option<i64>,
) -> Result<(treasury_account::Model, treasury_transaction::Model)>
where
    C: ConnectionTrait,
{
    let amount = round_money(request.amount);
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "Treasury amount must be positive: {}",
            request.amount
        )));
    }
    if request.description.trim().is_empty() {
        return Err(Error::validation("Treasury description cannot be empty"));
    }

    let account = TreasuryAccount::find_by_id(request.account_id)
        .one(db)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| Error::not_found("TreasuryAccount", request.account_id))?;

    if request.direction == Direction::Debit && amount > account.balance {
        warn!(
            account_id = account.id,
            balance = %account.balance,
            %amount,
            "Rejected treasury debit"
        );
        return Err(Error::InsufficientFunds {
            current: account.balance,
            required: amount,
        });
    }
    let new_balance = account.balance + request.direction.signed(amount);

    let now = chrono::Utc::now();
    let entry = treasury_transaction::ActiveModel {
        treasury_account_id: Set(account.id),
        direction: Set(request.direction),
        amount: Set(amount),
        transaction_type: Set(request.transaction_type),
        reference_type: Set(request.reference_type.clone()),
        reference_id: Set(request.reference_id),
        reverses_id: Set(reverses_id),
        description: Set(request.description.trim().to_string()),
        balance_after: Set(new_balance),
        created_by: Set(request.user.clone()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut active: treasury_account::ActiveModel = account.into();
    active.balance = Set(new_balance);
    active.modified_by = Set(Some(request.user.clone()));
    active.updated_at = Set(now);
    let account = active.update(db).await?;

    info!(
        account_id = account.id,
        direction = ?entry.direction,
        amount = %entry.amount,
        balance = %account.balance,
        "Posted treasury transaction"
    );
    Ok((account, entry))
}

/// Posts a movement inside an existing database transaction.
pub(crate) async fn post_in<C>(
    db: &C,
    request: &PostTreasuryTransaction,
) -> Result<treasury_transaction::Model>
where
    C: ConnectionTrait,
{
    Ok(post_entry(db, request, None).await?.1)
}

/// Posts a movement to a treasury account.
///
/// # Errors
/// Returns an error if:
/// - The amount is not positive or the description is empty
/// - The account does not exist or is inactive
/// - A debit exceeds the current balance
#[instrument(skip(db))]
pub async fn post_transaction(
    db: &DatabaseConnection,
    request: PostTreasuryTransaction,
) -> Result<treasury_transaction::Model> {
    let txn = db.begin().await?;
    let (_, entry) = post_entry(&txn, &request, None).await?;
    txn.commit().await?;
    Ok(entry)
}

/// Moves money from one account to another as a paired debit and credit.
pub async fn transfer(
    db: &DatabaseConnection,
    from_account_id: i64,
    to_account_id: i64,
    amount: Decimal,
    user: &str,
) -> Result<(treasury_transaction::Model, treasury_transaction::Model)> {
    if from_account_id == to_account_id {
        return Err(Error::validation("Cannot transfer to the same account"));
    }

    let txn = db.begin().await?;
    let debit = post_in(
        &txn,
        &PostTreasuryTransaction {
            account_id: from_account_id,
            direction: Direction::Debit,
            amount,
            transaction_type: TreasuryTransactionType::Transfer,
            reference_type: Some("TreasuryAccount".to_string()),
            reference_id: Some(to_account_id),
            description: format!("Transfer to account {to_account_id}"),
            user: user.to_string(),
        },
    )
    .await?;
    let credit = post_in(
        &txn,
        &PostTreasuryTransaction {
            account_id: to_account_id,
            direction: Direction::Credit,
            amount,
            transaction_type: TreasuryTransactionType::Transfer,
            reference_type: Some("TreasuryAccount".to_string()),
            reference_id: Some(from_account_id),
            description: format!("Transfer from account {from_account_id}"),
            user: user.to_string(),
        },
    )
    .await?;
    txn.commit().await?;

    Ok((debit, credit))
}

/// Appends the opposite of an earlier movement.
///
/// Only stand-alone deposits and withdrawals can be reversed. Movements posted by
/// another ledger (openings, drawer floats and settlements, supplier payments,
/// transfers) are left to that ledger.
///
/// # Errors
/// Returns [`Error::InvalidEntityState`] when the movement is itself a reversal, has
/// already been reversed, or belongs to another ledger.
pub async fn reverse_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
    user: &str,
) -> Result<treasury_transaction::Model> {
    let txn = db.begin().await?;

    let original = TreasuryTransaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("TreasuryTransaction", transaction_id))?;
    let refusal = match original.transaction_type {
        TreasuryTransactionType::Reversal => Some("reversals cannot be reversed"),
        TreasuryTransactionType::Opening
        | TreasuryTransactionType::DrawerFloat
        | TreasuryTransactionType::DrawerSettlement
        | TreasuryTransactionType::SupplierPayment
        | TreasuryTransactionType::Transfer => {
            Some("belongs to another ledger and must be corrected there")
        }
        TreasuryTransactionType::Deposit | TreasuryTransactionType::Withdrawal
            if original.reference_type.is_some() =>
        {
            Some("references another record and must be corrected there")
        }
        TreasuryTransactionType::Deposit | TreasuryTransactionType::Withdrawal => None,
    };
    if let Some(message) = refusal {
        warn!(transaction_id, transaction_type = ?original.transaction_type, "Rejected reversal");
        return Err(Error::invalid_state("TreasuryTransaction", transaction_id, message));
    }
    let already = TreasuryTransaction::find()
        .filter(treasury_transaction::Column::ReversesId.eq(transaction_id))
        .one(&txn)
        .await?;
    if already.is_some() {
        return Err(Error::invalid_state(
            "TreasuryTransaction",
            transaction_id,
            "already reversed",
        ));
    }

    let request = PostTreasuryTransaction {
        account_id: original.treasury_account_id,
        direction: original.direction.opposite(),
        amount: original.amount,
        transaction_type: TreasuryTransactionType::Reversal,
        reference_type: original.reference_type.clone(),
        reference_id: original.reference_id,
        description: format!("Reversal of transaction {transaction_id}"),
        user: user.to_string(),
    };
    let (_, entry) = post_entry(&txn, &request, Some(original.id)).await?;
    txn.commit().await?;

    Ok(entry)
}

/// All movements of an account, oldest first.
pub async fn get_transactions(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<Vec<treasury_transaction::Model>> {
    TreasuryTransaction::find()
        .filter(treasury_transaction::Column::TreasuryAccountId.eq(account_id))
        .order_by_asc(treasury_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Compares an account's stored balance with its transaction history.
pub async fn reconcile(db: &DatabaseConnection, account_id: i64) -> Result<Reconciliation> {
    let account = get_account(db, account_id)
        .await?
        .ok_or_else(|| Error::not_found("TreasuryAccount", account_id))?;
    let transactions = get_transactions(db, account_id).await?;

    let mut running = Decimal::ZERO;
    let mut running_balances_match = true;
    for entry in &transactions {
        running += entry.signed_amount();
        if entry.balance_after != running {
            running_balances_match = false;
        }
    }

    let reconciliation = Reconciliation {
        account_id,
        stored_balance: account.balance,
        computed_balance: running,
        difference: account.balance - running,
        transaction_count: transactions.len(),
        running_balances_match,
    };
    if !reconciliation.is_balanced() {
        warn!(?reconciliation, "Treasury account does not reconcile");
    }
    Ok(reconciliation)
}

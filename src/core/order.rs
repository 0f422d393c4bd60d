//! Order business logic - Sales, repairs, returns and cancellations.
//!
//! Every order is written in one database transaction together with its items, its
//! financial transaction and the stock changes it causes. Items snapshot every pricing
//! input so that [`verify_order`] can reprice them later without the live rate tables.

use crate::{
    core::{
        branch::require_active_branch,
        customer::require_active_customer,
        gold_rate::require_current_rate,
        pricing::{LineInput, LinePricing, matches_stored, price_line, price_order, round_money},
        product::{require_active_product, set_product_status},
        tax::applicable_tax_percent,
    },
    entities::{
        FinancialStatus, FinancialTransaction, Karat, MakingChargeKind, Order, OrderItem,
        OrderStatus, OrderType, PaymentMethod, Product, ProductStatus, financial_transaction,
        order, order_item,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Tax category used to look up the rate charged on repairs
pub const REPAIR_TAX_CATEGORY: &str = "repair";

/// One product on a sale
#[derive(Debug, Clone)]
pub struct SaleLine {
    /// Product being sold
    pub product_id: i64,
    /// Discount requested for the line
    pub discount: Decimal,
}

/// Money tendered by the customer
#[derive(Debug, Clone, Copy)]
pub struct Payment {
    /// Tender type
    pub method: PaymentMethod,
    /// Amount handed over
    pub amount: Decimal,
}

/// Input for [`create_sale`]
#[derive(Debug, Clone)]
pub struct NewSale {
    /// Branch selling the pieces
    pub branch_id: i64,
    /// Customer, if known
    pub customer_id: Option<i64>,
    /// Products sold, each at most once
    pub lines: Vec<SaleLine>,
    /// Payment received
    pub payment: Payment,
    /// Trading day the sale counts towards
    pub business_date: NaiveDate,
    /// User taking the sale
    pub user: String,
}

/// Input for [`create_repair`]
#[derive(Debug, Clone)]
pub struct NewRepair {
    /// Branch doing the repair
    pub branch_id: i64,
    /// Customer, if known
    pub customer_id: Option<i64>,
    /// What was repaired
    pub description: String,
    /// Purity of any gold added
    pub karat: Karat,
    /// Grams of gold added; zero for labor only
    pub added_weight: Decimal,
    /// Labor charge for the work
    pub labor_charge: Decimal,
    /// Discount requested
    pub discount: Decimal,
    /// Payment received
    pub payment: Payment,
    /// Trading day the repair counts towards
    pub business_date: NaiveDate,
    /// User taking the repair
    pub user: String,
}

/// Input for [`create_return`]
#[derive(Debug, Clone)]
pub struct NewReturn {
    /// Sale being refunded
    pub original_order_id: i64,
    /// Products handed back
    pub product_ids: Vec<i64>,
    /// How the refund is paid out
    pub payment_method: PaymentMethod,
    /// Trading day the refund counts towards
    pub business_date: NaiveDate,
    /// Why the pieces came back
    pub reason: Option<String>,
    /// User taking the return
    pub user: String,
}

/// An order together with its items and financial transaction
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    /// Order header
    pub order: order::Model,
    /// Item rows, in insertion order
    pub items: Vec<order_item::Model>,
    /// Money side of the order
    pub transaction: financial_transaction::Model,
}

/// Outcome of repricing a stored order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderVerification {
    /// Order checked
    pub order_id: i64,
    /// Number of items repriced
    pub items_checked: usize,
    /// Items whose recomputed total differs from the stored one
    pub mismatched_item_ids: Vec<i64>,
    /// Whether header and financial totals equal the item sums
    pub totals_match: bool,
}

impl OrderVerification {
    /// True when every item and every total agrees
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mismatched_item_ids.is_empty() && self.totals_match
    }
}

/// A line ready to be written, priced or copied from an earlier order
#[derive(Debug, Clone)]
struct PricedLine {
    product_id: Option<i64>,
    description: String,
    karat: Karat,
    weight: Decimal,
    quantity: i32,
    gold_rate_id: Option<i64>,
    rate_per_gram: Decimal,
    making_charge: Decimal,
    making_charge_kind: MakingChargeKind,
    discount: Decimal,
    tax_percent: Decimal,
    subtotal: Decimal,
    applied_discount: Decimal,
    tax: Decimal,
    total: Decimal,
}

impl PricedLine {
    fn priced(
        product_id: Option<i64>,
        description: String,
        karat: Karat,
        gold_rate_id: Option<i64>,
        input: &LineInput,
        pricing: &LinePricing,
    ) -> Result<Self> {
        let quantity = i32::try_from(input.quantity)
            .map_err(|_| Error::validation(format!("Quantity too large: {}", input.quantity)))?;
        Ok(Self {
            product_id,
            description,
            karat,
            weight: input.weight,
            quantity,
            gold_rate_id,
            rate_per_gram: input.rate_per_gram,
            making_charge: input.making_charge,
            making_charge_kind: input.making_charge_kind,
            discount: round_money(input.discount),
            tax_percent: input.tax_percent,
            subtotal: pricing.subtotal,
            applied_discount: pricing.discount,
            tax: pricing.tax,
            total: pricing.total,
        })
    }

    /// Copies a sold line as it was charged
    fn refund_of(item: &order_item::Model) -> Self {
        Self {
            product_id: item.product_id,
            description: item.description.clone(),
            karat: item.karat,
            weight: item.weight,
            quantity: item.quantity,
            gold_rate_id: item.gold_rate_id,
            rate_per_gram: item.rate_per_gram,
            making_charge: item.making_charge,
            making_charge_kind: item.making_charge_kind,
            discount: item.discount,
            tax_percent: item.tax_percent,
            subtotal: item.subtotal,
            applied_discount: item.applied_discount,
            tax: item.tax,
            total: item.total,
        }
    }

    fn into_active_model(self, order_id: i64, now: DateTimeUtc) -> order_item::ActiveModel {
        order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(self.product_id),
            description: Set(self.description),
            karat: Set(self.karat),
            weight: Set(self.weight),
            quantity: Set(self.quantity),
            gold_rate_id: Set(self.gold_rate_id),
            rate_per_gram: Set(self.rate_per_gram),
            making_charge: Set(self.making_charge),
            making_charge_kind: Set(self.making_charge_kind),
            discount: Set(self.discount),
            tax_percent: Set(self.tax_percent),
            subtotal: Set(self.subtotal),
            applied_discount: Set(self.applied_discount),
            tax: Set(self.tax),
            total: Set(self.total),
            is_returned: Set(false),
            created_at: Set(now),
            ..Default::default()
        }
    }
}

/// Everything needed to write an order, its items and its financial transaction
struct OrderDraft {
    order_type: OrderType,
    branch_id: i64,
    customer_id: Option<i64>,
    original_order_id: Option<i64>,
    notes: Option<String>,
    lines: Vec<PricedLine>,
    payment_method: PaymentMethod,
    amount_paid: Decimal,
    change_due: Decimal,
    business_date: NaiveDate,
    user: String,
}

fn order_prefix(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Sale => "SO",
        OrderType::Return => "RT",
        OrderType::Repair => "RP",
    }
}

async fn next_order_number<C>(db: &C, order_type: OrderType) -> Result<String>
where
    C: ConnectionTrait,
{
    let count = Order::find()
        .filter(order::Column::OrderType.eq(order_type))
        .count(db)
        .await?;
    Ok(format!("{}-{:06}", order_prefix(order_type), count + 1))
}

/// Checks a tendered payment against the amount due.
///
/// Returns the amount paid and the change due. Cash may exceed the total; other tenders
/// must match it exactly.
fn settle_payment(payment: &Payment, total: Decimal) -> Result<(Decimal, Decimal)> {
    let amount = round_money(payment.amount);
    if amount < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Payment amount cannot be negative: {amount}"
        )));
    }
    match payment.method {
        PaymentMethod::Cash if amount < total => Err(Error::payment(format!(
            "Cash tendered {amount} is less than the total {total}"
        ))),
        PaymentMethod::Cash => Ok((amount, amount - total)),
        method if amount != total => Err(Error::payment(format!(
            "{method:?} payment of {amount} must equal the total {total}"
        ))),
        _ => Ok((amount, Decimal::ZERO)),
    }
}

async fn persist_order<C>(db: &C, draft: OrderDraft) -> Result<OrderReceipt>
where
    C: ConnectionTrait,
{
    let order_number = next_order_number(db, draft.order_type).await?;
    let now = chrono::Utc::now();

    let (subtotal, discount, tax, total) = draft.lines.iter().fold(
        (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        |(subtotal, discount, tax, total), line| {
            (
                subtotal + line.subtotal,
                discount + line.applied_discount,
                tax + line.tax,
                total + line.total,
            )
        },
    );

    let order = order::ActiveModel {
        order_number: Set(order_number),
        order_type: Set(draft.order_type),
        status: Set(OrderStatus::Completed),
        branch_id: Set(draft.branch_id),
        customer_id: Set(draft.customer_id),
        original_order_id: Set(draft.original_order_id),
        notes: Set(draft.notes),
        subtotal: Set(subtotal),
        discount: Set(discount),
        tax: Set(tax),
        total: Set(total),
        is_active: Set(true),
        created_by: Set(draft.user.clone()),
        modified_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for line in draft.lines {
        items.push(line.into_active_model(order.id, now).insert(db).await?);
    }

    let transaction = financial_transaction::ActiveModel {
        order_id: Set(order.id),
        branch_id: Set(draft.branch_id),
        transaction_type: Set(draft.order_type),
        subtotal: Set(subtotal),
        discount: Set(discount),
        tax: Set(tax),
        total: Set(total),
        amount_paid: Set(draft.amount_paid),
        change_due: Set(draft.change_due),
        payment_method: Set(draft.payment_method),
        business_date: Set(draft.business_date),
        status: Set(FinancialStatus::Posted),
        created_by: Set(draft.user),
        modified_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(OrderReceipt {
        order,
        items,
        transaction,
    })
}

/// Sells one or more available products.
///
/// Each line is priced at the current rate for the product's karat plus its making
/// charge, minus the line discount, plus the tax for the product's category.
///
/// # Errors
/// Returns an error if:
/// - There are no lines, a product appears twice or the payment is negative
/// - The branch, customer or a product does not exist or is inactive
/// - A product is already sold ([`Error::InsufficientStock`])
/// - A product is held at another branch
/// - No current rate exists for a product's karat
/// - The payment does not cover the total
#[instrument(skip(db, sale), fields(branch_id = sale.branch_id, lines = sale.lines.len()))]
pub async fn create_sale(db: &DatabaseConnection, sale: NewSale) -> Result<OrderReceipt> {
    if sale.lines.is_empty() {
        return Err(Error::validation("A sale needs at least one line"));
    }
    let mut seen = HashSet::new();
    if let Some(line) = sale.lines.iter().find(|l| !seen.insert(l.product_id)) {
        return Err(Error::validation(format!(
            "Product {} appears more than once",
            line.product_id
        )));
    }

    let txn = db.begin().await?;
    require_active_branch(&txn, sale.branch_id).await?;
    if let Some(customer_id) = sale.customer_id {
        require_active_customer(&txn, customer_id).await?;
    }

    let mut products = Vec::with_capacity(sale.lines.len());
    let mut inputs = Vec::with_capacity(sale.lines.len());
    let mut rate_ids = Vec::with_capacity(sale.lines.len());
    for line in &sale.lines {
        let product = require_active_product(&txn, line.product_id).await?;
        if product.status != ProductStatus::Available {
            warn!(product_id = product.id, "Product already sold");
            return Err(Error::InsufficientStock {
                product_id: product.id,
            });
        }
        if product.branch_id != sale.branch_id {
            return Err(Error::invalid_state(
                "Product",
                product.id,
                format!("held at branch {}", product.branch_id),
            ));
        }

        let rate = require_current_rate(&txn, product.karat).await?;
        let tax_percent = applicable_tax_percent(&txn, &product.category).await?;
        inputs.push(LineInput {
            rate_per_gram: rate.rate_per_gram,
            weight: product.weight,
            quantity: 1,
            making_charge: product.making_charge,
            making_charge_kind: product.making_charge_kind,
            discount: line.discount,
            tax_percent,
        });
        rate_ids.push(rate.id);
        products.push(product);
    }

    let pricing = price_order(&inputs)?;
    let (amount_paid, change_due) = settle_payment(&sale.payment, pricing.total)?;

    let mut lines = Vec::with_capacity(products.len());
    for (((product, input), line_pricing), rate_id) in
        products.iter().zip(&inputs).zip(&pricing.lines).zip(rate_ids)
    {
        lines.push(PricedLine::priced(
            Some(product.id),
            product.name.clone(),
            product.karat,
            Some(rate_id),
            input,
            line_pricing,
        )?);
    }

    let receipt = persist_order(
        &txn,
        OrderDraft {
            order_type: OrderType::Sale,
            branch_id: sale.branch_id,
            customer_id: sale.customer_id,
            original_order_id: None,
            notes: None,
            lines,
            payment_method: sale.payment.method,
            amount_paid,
            change_due,
            business_date: sale.business_date,
            user: sale.user.clone(),
        },
    )
    .await?;

    for product in products {
        set_product_status(&txn, product, ProductStatus::Sold, &sale.user).await?;
    }
    txn.commit().await?;

    info!(
        order_id = receipt.order.id,
        order_number = %receipt.order.order_number,
        total = %receipt.order.total,
        "Created sale"
    );
    Ok(receipt)
}

/// Records a repair.
///
/// The repair is priced like a sale line: the added gold at the current rate for its
/// karat, with the labor charge as a fixed making charge. Labor-only repairs need no
/// current rate.
#[instrument(skip(db, repair), fields(branch_id = repair.branch_id))]
pub async fn create_repair(db: &DatabaseConnection, repair: NewRepair) -> Result<OrderReceipt> {
    let description = repair.description.trim().to_string();
    if description.is_empty() {
        return Err(Error::validation("Repair description cannot be empty"));
    }
    if repair.added_weight < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Added weight cannot be negative: {}",
            repair.added_weight
        )));
    }

    let txn = db.begin().await?;
    require_active_branch(&txn, repair.branch_id).await?;
    if let Some(customer_id) = repair.customer_id {
        require_active_customer(&txn, customer_id).await?;
    }

    let (rate_id, rate_per_gram) = if repair.added_weight.is_zero() {
        (None, Decimal::ZERO)
    } else {
        let rate = require_current_rate(&txn, repair.karat).await?;
        (Some(rate.id), rate.rate_per_gram)
    };
    let tax_percent = applicable_tax_percent(&txn, REPAIR_TAX_CATEGORY).await?;

    let input = LineInput {
        rate_per_gram,
        weight: repair.added_weight,
        quantity: 1,
        making_charge: repair.labor_charge,
        making_charge_kind: MakingChargeKind::Fixed,
        discount: repair.discount,
        tax_percent,
    };
    let pricing = price_line(&input)?;
    let (amount_paid, change_due) = settle_payment(&repair.payment, pricing.total)?;

    let line = PricedLine::priced(
        None,
        description.clone(),
        repair.karat,
        rate_id,
        &input,
        &pricing,
    )?;
    let receipt = persist_order(
        &txn,
        OrderDraft {
            order_type: OrderType::Repair,
            branch_id: repair.branch_id,
            customer_id: repair.customer_id,
            original_order_id: None,
            notes: Some(description),
            lines: vec![line],
            payment_method: repair.payment.method,
            amount_paid,
            change_due,
            business_date: repair.business_date,
            user: repair.user,
        },
    )
    .await?;
    txn.commit().await?;

    info!(
        order_id = receipt.order.id,
        total = %receipt.order.total,
        "Created repair"
    );
    Ok(receipt)
}

/// Refunds products from a completed sale at the price they were sold for.
///
/// The returned lines are copied from the sale; the current gold rate is never read.
/// When every line of the sale has been returned the sale becomes `Returned`.
///
/// # Errors
/// Returns [`Error::InvalidEntityState`] when the original order is not a completed sale
/// or a product is not on it or was already returned.
#[instrument(skip(db, request), fields(original_order_id = request.original_order_id))]
pub async fn create_return(db: &DatabaseConnection, request: NewReturn) -> Result<OrderReceipt> {
    if request.product_ids.is_empty() {
        return Err(Error::validation("A return needs at least one product"));
    }
    let mut seen = HashSet::new();
    if let Some(product_id) = request.product_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(Error::validation(format!(
            "Product {product_id} appears more than once"
        )));
    }

    let txn = db.begin().await?;
    let original = Order::find_by_id(request.original_order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order", request.original_order_id))?;
    if original.order_type != OrderType::Sale || original.status != OrderStatus::Completed {
        return Err(Error::invalid_state(
            "Order",
            original.id,
            format!(
                "only completed sales can be returned, found {:?} {:?}",
                original.status, original.order_type
            ),
        ));
    }

    let original_items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(original.id))
        .order_by_asc(order_item::Column::Id)
        .all(&txn)
        .await?;

    let mut returned_items = Vec::with_capacity(request.product_ids.len());
    for product_id in &request.product_ids {
        let item = original_items
            .iter()
            .find(|item| item.product_id == Some(*product_id))
            .ok_or_else(|| {
                Error::invalid_state(
                    "Order",
                    original.id,
                    format!("product {product_id} is not on this order"),
                )
            })?;
        if item.is_returned {
            return Err(Error::invalid_state(
                "Order",
                original.id,
                format!("product {product_id} was already returned"),
            ));
        }
        returned_items.push(item.clone());
    }

    let lines = returned_items.iter().map(PricedLine::refund_of).collect();
    let refund_total: Decimal = returned_items.iter().map(|item| item.total).sum();
    let receipt = persist_order(
        &txn,
        OrderDraft {
            order_type: OrderType::Return,
            branch_id: original.branch_id,
            customer_id: original.customer_id,
            original_order_id: Some(original.id),
            notes: request.reason.clone(),
            lines,
            payment_method: request.payment_method,
            amount_paid: refund_total,
            change_due: Decimal::ZERO,
            business_date: request.business_date,
            user: request.user.clone(),
        },
    )
    .await?;

    let now = chrono::Utc::now();
    for item in returned_items {
        if let Some(product_id) = item.product_id {
            let product = Product::find_by_id(product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| Error::not_found("Product", product_id))?;
            set_product_status(&txn, product, ProductStatus::Available, &request.user).await?;
        }
        let mut active: order_item::ActiveModel = item.into();
        active.is_returned = Set(true);
        active.update(&txn).await?;
    }

    let remaining = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(original.id))
        .filter(order_item::Column::IsReturned.eq(false))
        .count(&txn)
        .await?;
    if remaining == 0 {
        let mut active: order::ActiveModel = original.into();
        active.status = Set(OrderStatus::Returned);
        active.modified_by = Set(Some(request.user.clone()));
        active.updated_at = Set(now);
        active.update(&txn).await?;
    }
    txn.commit().await?;

    info!(
        order_id = receipt.order.id,
        original_order_id = request.original_order_id,
        refund = %receipt.order.total,
        "Created return"
    );
    Ok(receipt)
}

/// Cancels a completed sale or repair.
///
/// Sold products go back to stock and the financial transaction is voided. Orders with
/// returned lines cannot be cancelled.
#[instrument(skip(db))]
pub async fn cancel_order(db: &DatabaseConnection, order_id: i64, user: &str) -> Result<order::Model> {
    let txn = db.begin().await?;
    let order = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    if order.order_type == OrderType::Return {
        return Err(Error::invalid_state("Order", order_id, "returns cannot be cancelled"));
    }
    if order.status != OrderStatus::Completed {
        return Err(Error::invalid_state(
            "Order",
            order_id,
            format!("cannot cancel a {:?} order", order.status),
        ));
    }

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&txn)
        .await?;
    if items.iter().any(|item| item.is_returned) {
        return Err(Error::invalid_state(
            "Order",
            order_id,
            "has returned items",
        ));
    }

    for product_id in items.iter().filter_map(|item| item.product_id) {
        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found("Product", product_id))?;
        set_product_status(&txn, product, ProductStatus::Available, user).await?;
    }

    let now = chrono::Utc::now();
    let transaction = FinancialTransaction::find()
        .filter(financial_transaction::Column::OrderId.eq(order_id))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("FinancialTransaction", format!("order {order_id}")))?;
    let mut active: financial_transaction::ActiveModel = transaction.into();
    active.status = Set(FinancialStatus::Voided);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(now);
    active.update(&txn).await?;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.modified_by = Set(Some(user.to_string()));
    active.updated_at = Set(now);
    let order = active.update(&txn).await?;
    txn.commit().await?;

    info!(order_id, "Cancelled order");
    Ok(order)
}

/// Retrieves an order header by id.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<Option<order::Model>> {
    Order::find_by_id(order_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the items of an order in the order they were written.
pub async fn get_order_items(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Vec<order_item::Model>> {
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads an order with its items and financial transaction.
pub async fn get_order_receipt(db: &DatabaseConnection, order_id: i64) -> Result<OrderReceipt> {
    let order = get_order(db, order_id)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    let items = get_order_items(db, order_id).await?;
    let transaction = FinancialTransaction::find()
        .filter(financial_transaction::Column::OrderId.eq(order_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("FinancialTransaction", format!("order {order_id}")))?;
    Ok(OrderReceipt {
        order,
        items,
        transaction,
    })
}

/// Reprices every item of an order from its snapshot and compares the stored totals.
pub async fn verify_order(db: &DatabaseConnection, order_id: i64) -> Result<OrderVerification> {
    let receipt = get_order_receipt(db, order_id).await?;

    let mut mismatched_item_ids = Vec::new();
    for item in &receipt.items {
        if !matches_stored(item)? {
            mismatched_item_ids.push(item.id);
        }
    }

    let sum = |f: fn(&order_item::Model) -> Decimal| -> Decimal {
        round_money(receipt.items.iter().map(f).sum())
    };
    let order = &receipt.order;
    let totals_match = round_money(order.subtotal) == sum(|i| i.subtotal)
        && round_money(order.discount) == sum(|i| i.applied_discount)
        && round_money(order.tax) == sum(|i| i.tax)
        && round_money(order.total) == sum(|i| i.total)
        && round_money(receipt.transaction.total) == round_money(order.total);

    let verification = OrderVerification {
        order_id,
        items_checked: receipt.items.len(),
        mismatched_item_ids,
        totals_match,
    };
    if verification.is_consistent() {
        debug!(order_id, "Order verified");
    } else {
        warn!(?verification, "Order totals do not match their snapshots");
    }
    Ok(verification)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{gold_rate, product::get_product_by_id};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn cash(amount: &str) -> Payment {
        Payment {
            method: PaymentMethod::Cash,
            amount: dec(amount),
        }
    }

    fn sale_of(branch_id: i64, product_ids: &[i64], payment: Payment) -> NewSale {
        NewSale {
            branch_id,
            customer_id: None,
            lines: product_ids
                .iter()
                .map(|&product_id| SaleLine {
                    product_id,
                    discount: Decimal::ZERO,
                })
                .collect(),
            payment,
            business_date: test_date(),
            user: TEST_USER.to_string(),
        }
    }

    fn return_of(order_id: i64, product_ids: &[i64]) -> NewReturn {
        NewReturn {
            original_order_id: order_id,
            product_ids: product_ids.to_vec(),
            payment_method: PaymentMethod::Cash,
            business_date: test_date(),
            reason: Some("Changed mind".to_string()),
            user: TEST_USER.to_string(),
        }
    }

    fn repair(branch_id: i64, weight: &str, labor: &str, payment: Payment) -> NewRepair {
        NewRepair {
            branch_id,
            customer_id: None,
            description: "Resize ring".to_string(),
            karat: Karat::K22,
            added_weight: dec(weight),
            labor_charge: dec(labor),
            discount: Decimal::ZERO,
            payment,
            business_date: test_date(),
            user: TEST_USER.to_string(),
        }
    }

    #[test]
    fn test_settle_payment() {
        let total = dec("100.00");
        assert_eq!(
            settle_payment(&cash("150"), total).unwrap(),
            (dec("150"), dec("50"))
        );
        assert!(matches!(
            settle_payment(&cash("99.99"), total),
            Err(Error::Payment { .. })
        ));

        let card = Payment {
            method: PaymentMethod::Card,
            amount: dec("100"),
        };
        assert_eq!(settle_payment(&card, total).unwrap(), (dec("100"), Decimal::ZERO));
        let over = Payment {
            amount: dec("120"),
            ..card
        };
        assert!(matches!(settle_payment(&over, total), Err(Error::Payment { .. })));

        assert!(matches!(
            settle_payment(&cash("-1"), total),
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_sale_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_sale(&db, sale_of(1, &[], cash("10"))).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_sale(&db, sale_of(1, &[3, 3], cash("10"))).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_sale() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        let customer = create_test_customer(&db, "Aisha").await?;
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();

        let mut sale = sale_of(branch.id, &ids, cash("5000"));
        sale.customer_id = Some(customer.id);
        let receipt = create_sale(&db, sale).await?;

        assert_eq!(receipt.order.order_number, "SO-000001");
        assert_eq!(receipt.order.order_type, OrderType::Sale);
        assert_eq!(receipt.order.status, OrderStatus::Completed);
        assert_eq!(receipt.order.customer_id, Some(customer.id));
        assert_eq!(receipt.order.subtotal, dec("3950"));
        assert_eq!(receipt.order.tax, dec("197.50"));
        assert_eq!(receipt.order.total, dec("4147.50"));

        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[0].total, dec("2730"));
        assert_eq!(receipt.items[0].rate_per_gram, dec("250"));
        assert!(receipt.items[0].gold_rate_id.is_some());
        assert_eq!(receipt.items[1].total, dec("1417.50"));

        assert_eq!(receipt.transaction.amount_paid, dec("5000"));
        assert_eq!(receipt.transaction.change_due, dec("852.50"));
        assert_eq!(receipt.transaction.status, FinancialStatus::Posted);
        assert_eq!(receipt.transaction.business_date, test_date());

        for id in ids {
            let product = get_product_by_id(&db, id).await?.unwrap();
            assert_eq!(product.status, ProductStatus::Sold);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_sale_discount_never_goes_below_zero() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;

        let mut sale = sale_of(branch.id, &[products[0].id], cash("0"));
        sale.lines[0].discount = dec("99999");
        let receipt = create_sale(&db, sale).await?;

        assert_eq!(receipt.items[0].applied_discount, dec("2600"));
        assert_eq!(receipt.order.tax, Decimal::ZERO);
        assert_eq!(receipt.order.total, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_sale_underpaid_writes_nothing() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;

        let result = create_sale(&db, sale_of(branch.id, &[products[0].id], cash("2729.99"))).await;
        assert!(matches!(result, Err(Error::Payment { .. })));

        let card = Payment {
            method: PaymentMethod::Card,
            amount: dec("3000"),
        };
        let result = create_sale(&db, sale_of(branch.id, &[products[0].id], card)).await;
        assert!(matches!(result, Err(Error::Payment { .. })));

        let product = get_product_by_id(&db, products[0].id).await?.unwrap();
        assert_eq!(product.status, ProductStatus::Available);
        assert_eq!(Order::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_sale_rejects_sold_product() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        create_sale(&db, sale_of(branch.id, &[products[0].id], cash("3000"))).await?;

        let result = create_sale(
            &db,
            sale_of(branch.id, &[products[1].id, products[0].id], cash("9000")),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientStock { product_id }) if product_id == products[0].id
        ));

        // The first line was rolled back with the rest
        let chain = get_product_by_id(&db, products[1].id).await?.unwrap();
        assert_eq!(chain.status, ProductStatus::Available);

        Ok(())
    }

    #[tokio::test]
    async fn test_sale_requires_current_rate() -> Result<()> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;
        let product = create_test_product(&db, branch.id, "R-18", Karat::K18, "3").await?;

        let result = create_sale(&db, sale_of(branch.id, &[product.id], cash("5000"))).await;
        assert!(matches!(result, Err(Error::EntityNotFound { entity: "GoldRate", .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_sale_rejects_product_from_other_branch() -> Result<()> {
        let (db, _, products) = setup_with_stock().await?;
        let other = create_test_branch(&db, "Mall").await?;

        let result = create_sale(&db, sale_of(other.id, &[products[0].id], cash("5000"))).await;
        assert!(matches!(result, Err(Error::InvalidEntityState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_sale_snapshot_survives_rate_change() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        let receipt = create_sale(&db, sale_of(branch.id, &[products[0].id], cash("3000"))).await?;

        gold_rate::set_gold_rate(&db, Karat::K21, dec("300"), TEST_USER).await?;

        let verification = verify_order(&db, receipt.order.id).await?;
        assert!(verification.is_consistent());
        assert_eq!(verification.items_checked, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_order_detects_tampering() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        let receipt = create_sale(&db, sale_of(branch.id, &[products[0].id], cash("3000"))).await?;

        let item = receipt.items[0].clone();
        let mut active: order_item::ActiveModel = item.clone().into();
        active.total = Set(dec("2000"));
        active.update(&db).await?;

        let verification = verify_order(&db, receipt.order.id).await?;
        assert!(!verification.is_consistent());
        assert_eq!(verification.mismatched_item_ids, vec![item.id]);
        assert!(!verification.totals_match);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_repair() -> Result<()> {
        let (db, branch, _) = setup_with_stock().await?;

        // 2g of 22K at 260 plus 150 labor, 5% tax
        let receipt = create_repair(&db, repair(branch.id, "2", "150", cash("800"))).await?;
        assert_eq!(receipt.order.order_number, "RP-000001");
        assert_eq!(receipt.order.order_type, OrderType::Repair);
        assert_eq!(receipt.order.notes.as_deref(), Some("Resize ring"));
        assert_eq!(receipt.items[0].product_id, None);
        assert_eq!(receipt.order.subtotal, dec("670"));
        assert_eq!(receipt.order.total, dec("703.50"));
        assert_eq!(receipt.transaction.change_due, dec("96.50"));

        assert!(verify_order(&db, receipt.order.id).await?.is_consistent());

        Ok(())
    }

    #[tokio::test]
    async fn test_labor_only_repair_needs_no_rate() -> Result<()> {
        let db = setup_test_db().await?;
        let branch = create_test_branch(&db, "Main").await?;

        let receipt = create_repair(&db, repair(branch.id, "0", "80", cash("80"))).await?;
        assert_eq!(receipt.items[0].gold_rate_id, None);
        assert_eq!(receipt.order.total, dec("80"));

        let result = create_repair(&db, repair(branch.id, "1", "80", cash("500"))).await;
        assert!(matches!(result, Err(Error::EntityNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_partial_then_full_return() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let sale = create_sale(&db, sale_of(branch.id, &ids, cash("4147.50"))).await?;

        // A new rate must not change the refund
        gold_rate::set_gold_rate(&db, Karat::K21, dec("400"), TEST_USER).await?;

        let refund = create_return(&db, return_of(sale.order.id, &[ids[0]])).await?;
        assert_eq!(refund.order.order_number, "RT-000001");
        assert_eq!(refund.order.original_order_id, Some(sale.order.id));
        assert_eq!(refund.order.total, dec("2730"));
        assert_eq!(refund.transaction.transaction_type, OrderType::Return);
        assert_eq!(refund.transaction.amount_paid, dec("2730"));
        assert_eq!(refund.transaction.cash_effect(), dec("-2730"));

        let ring = get_product_by_id(&db, ids[0]).await?.unwrap();
        assert_eq!(ring.status, ProductStatus::Available);
        let original = get_order(&db, sale.order.id).await?.unwrap();
        assert_eq!(original.status, OrderStatus::Completed);

        let again = create_return(&db, return_of(sale.order.id, &[ids[0]])).await;
        assert!(matches!(again, Err(Error::InvalidEntityState { .. })));

        create_return(&db, return_of(sale.order.id, &[ids[1]])).await?;
        let original = get_order(&db, sale.order.id).await?.unwrap();
        assert_eq!(original.status, OrderStatus::Returned);

        let items = get_order_items(&db, sale.order.id).await?;
        assert!(items.iter().all(|item| item.is_returned));

        Ok(())
    }

    #[tokio::test]
    async fn test_return_rejects_product_not_on_order() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        let sale = create_sale(&db, sale_of(branch.id, &[products[0].id], cash("3000"))).await?;

        let result = create_return(&db, return_of(sale.order.id, &[products[1].id])).await;
        assert!(matches!(result, Err(Error::InvalidEntityState { .. })));

        let result = create_return(&db, return_of(999, &[products[0].id])).await;
        assert!(matches!(result, Err(Error::EntityNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_sale() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        let sale = create_sale(&db, sale_of(branch.id, &[products[0].id], cash("3000"))).await?;

        let cancelled = cancel_order(&db, sale.order.id, "manager").await?;
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.modified_by.as_deref(), Some("manager"));

        let receipt = get_order_receipt(&db, sale.order.id).await?;
        assert_eq!(receipt.transaction.status, FinancialStatus::Voided);
        assert_eq!(receipt.transaction.cash_effect(), Decimal::ZERO);

        let ring = get_product_by_id(&db, products[0].id).await?.unwrap();
        assert_eq!(ring.status, ProductStatus::Available);

        let again = cancel_order(&db, sale.order.id, "manager").await;
        assert!(matches!(again, Err(Error::InvalidEntityState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_rejects_returns_and_partially_returned_sales() -> Result<()> {
        let (db, branch, products) = setup_with_stock().await?;
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let sale = create_sale(&db, sale_of(branch.id, &ids, cash("5000"))).await?;
        let refund = create_return(&db, return_of(sale.order.id, &[ids[0]])).await?;

        let result = cancel_order(&db, sale.order.id, TEST_USER).await;
        assert!(matches!(result, Err(Error::InvalidEntityState { .. })));

        let result = cancel_order(&db, refund.order.id, TEST_USER).await;
        assert!(matches!(result, Err(Error::InvalidEntityState { .. })));

        Ok(())
    }
}

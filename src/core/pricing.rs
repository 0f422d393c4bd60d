//! Gold pricing - Pure price calculations for order lines.
//!
//! A line is priced as
//! `gold value + making charge − discount`, then tax is added on the post-discount
//! amount. Every money component is rounded to two decimals before it is summed, so a
//! stored line can be recomputed exactly from its snapshot fields.
//!
//! Nothing in this module touches the database.

use crate::{
    entities::{Karat, MakingChargeKind, order_item},
    errors::{Error, Result},
};
use rust_decimal::{Decimal, RoundingStrategy};

/// Money is kept to this many decimal places
pub const MONEY_DECIMALS: u32 = 2;

/// Largest difference accepted between a stored and a recomputed total
pub const ROUNDING_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Rounds an amount to cents, halves away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Weights are kept to this many decimal places (milligrams)
pub const WEIGHT_DECIMALS: u32 = 3;

/// Rounds a weight to milligrams, halves away from zero.
#[must_use]
pub fn round_weight(grams: Decimal) -> Decimal {
    grams.round_dp_with_strategy(WEIGHT_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Multiplies two amounts, rejecting a product too large to represent.
///
/// # Errors
/// Returns [`Error::Validation`] naming `what` when the product overflows.
pub fn checked_mul(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| Error::validation(format!("{what} is too large: {a} × {b}")))
}

/// Adds two amounts, rejecting a sum too large to represent.
///
/// # Errors
/// Returns [`Error::Validation`] naming `what` when the sum overflows.
pub fn checked_add(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| Error::validation(format!("{what} is too large: {a} + {b}")))
}

/// Everything needed to price one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    /// Price of one gram at the line's karat
    pub rate_per_gram: Decimal,
    /// Grams per piece
    pub weight: Decimal,
    /// Number of pieces
    pub quantity: u32,
    /// Making charge amount
    pub making_charge: Decimal,
    /// How the making charge applies
    pub making_charge_kind: MakingChargeKind,
    /// Discount requested for the whole line
    pub discount: Decimal,
    /// Tax percentage, e.g. `5` for 5%
    pub tax_percent: Decimal,
}

/// Result of pricing one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePricing {
    /// `rate × weight × quantity`
    pub gold_value: Decimal,
    /// Making charge for the whole line
    pub making_charge: Decimal,
    /// Gold value plus making charge
    pub subtotal: Decimal,
    /// Discount applied, capped at the subtotal
    pub discount: Decimal,
    /// Subtotal minus discount
    pub taxable: Decimal,
    /// Tax on the taxable amount
    pub tax: Decimal,
    /// Taxable amount plus tax
    pub total: Decimal,
}

/// Totals over several lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPricing {
    /// Per-line results, in input order
    pub lines: Vec<LinePricing>,
    /// Sum of line subtotals
    pub subtotal: Decimal,
    /// Sum of applied discounts
    pub discount: Decimal,
    /// Sum of line taxes
    pub tax: Decimal,
    /// Sum of line totals
    pub total: Decimal,
}

fn ensure_non_negative(value: Decimal, field: &str) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::validation(format!("{field} cannot be negative: {value}")));
    }
    Ok(())
}

/// Validates a line's inputs without pricing it.
pub fn validate_line(input: &LineInput) -> Result<()> {
    ensure_non_negative(input.rate_per_gram, "Gold rate")?;
    ensure_non_negative(input.weight, "Weight")?;
    ensure_non_negative(input.making_charge, "Making charge")?;
    ensure_non_negative(input.discount, "Discount")?;
    ensure_non_negative(input.tax_percent, "Tax percent")?;
    if input.quantity == 0 {
        return Err(Error::validation("Quantity must be at least 1"));
    }
    Ok(())
}

/// Prices a single line.
///
/// # Errors
/// Returns [`Error::Validation`] when any amount is negative, the quantity is zero, or
/// an amount is too large to represent.
pub fn price_line(input: &LineInput) -> Result<LinePricing> {
    validate_line(input)?;

    let quantity = Decimal::from(input.quantity);
    let grams = checked_mul(input.weight, quantity, "Line weight")?;
    let gold_value = round_money(checked_mul(input.rate_per_gram, grams, "Gold value")?);
    let making_charge = match input.making_charge_kind {
        MakingChargeKind::Fixed => checked_mul(input.making_charge, quantity, "Making charge")?,
        MakingChargeKind::PerGram => checked_mul(input.making_charge, grams, "Making charge")?,
    };
    let making_charge = round_money(making_charge);
    let subtotal = checked_add(gold_value, making_charge, "Line subtotal")?;

    let discount = round_money(input.discount).min(subtotal);
    let taxable = subtotal - discount;
    let tax = round_money(checked_mul(taxable, input.tax_percent, "Tax")? / Decimal::ONE_HUNDRED);

    Ok(LinePricing {
        gold_value,
        making_charge,
        subtotal,
        discount,
        taxable,
        tax,
        total: checked_add(taxable, tax, "Line total")?,
    })
}

/// Prices every line and sums the results.
pub fn price_order(inputs: &[LineInput]) -> Result<OrderPricing> {
    inputs
        .iter()
        .try_fold(OrderPricing::default(), |mut acc, input| {
            let line = price_line(input)?;
            acc.subtotal = checked_add(acc.subtotal, line.subtotal, "Order subtotal")?;
            acc.discount += line.discount;
            acc.tax += line.tax;
            acc.total = checked_add(acc.total, line.total, "Order total")?;
            acc.lines.push(line);
            Ok(acc)
        })
}

/// Rebuilds the pricing inputs captured on a stored order item.
pub fn line_input_from_item(item: &order_item::Model) -> Result<LineInput> {
    let quantity = u32::try_from(item.quantity).map_err(|_| {
        Error::invalid_state("OrderItem", item.id, format!("quantity {}", item.quantity))
    })?;
    Ok(LineInput {
        rate_per_gram: item.rate_per_gram,
        weight: item.weight,
        quantity,
        making_charge: item.making_charge,
        making_charge_kind: item.making_charge_kind,
        discount: item.discount,
        tax_percent: item.tax_percent,
    })
}

/// Reprices a stored order item from its snapshot fields.
pub fn recompute_line(item: &order_item::Model) -> Result<LinePricing> {
    price_line(&line_input_from_item(item)?)
}

/// Whether recomputing a stored item reproduces its total within [`ROUNDING_TOLERANCE`].
pub fn matches_stored(item: &order_item::Model) -> Result<bool> {
    let recomputed = recompute_line(item)?;
    Ok((recomputed.total - item.total).abs() <= ROUNDING_TOLERANCE)
}

/// Derives a karat's per-gram rate from the 24K rate by purity.
#[must_use]
pub fn derive_rate_from_24k(base_rate: Decimal, karat: Karat) -> Decimal {
    round_money(base_rate * karat.purity())
}

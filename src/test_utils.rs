//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{branch, customer, gold_rate, product, supplier, tax, treasury},
    entities::{self, Karat, MakingChargeKind},
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// User recorded in audit columns by test fixtures
pub const TEST_USER: &str = "test_user";

/// Parses a decimal literal such as `"245.50"`
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Business date used throughout the tests
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a branch whose code is derived from its name.
pub async fn create_test_branch(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::branch::Model> {
    let code = name.to_uppercase().replace(' ', "-");
    branch::create_branch(db, name.to_string(), code, TEST_USER).await
}

/// Creates a supplier with no phone number.
pub async fn create_test_supplier(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::supplier::Model> {
    supplier::create_supplier(db, name.to_string(), None, TEST_USER).await
}

/// Creates a customer with no phone number.
pub async fn create_test_customer(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::customer::Model> {
    customer::create_customer(db, name.to_string(), None, TEST_USER).await
}

/// Creates an available product.
///
/// # Defaults
/// * `category`: "rings"
/// * `making_charge`: 100.00 fixed
/// * no supplier
pub async fn create_test_product(
    db: &DatabaseConnection,
    branch_id: i64,
    sku: &str,
    karat: Karat,
    weight: &str,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        product::NewProduct {
            sku: sku.to_string(),
            name: format!("Test piece {sku}"),
            category: "rings".to_string(),
            karat,
            weight: dec(weight),
            making_charge: dec("100.00"),
            making_charge_kind: MakingChargeKind::Fixed,
            supplier_id: None,
            branch_id,
        },
        TEST_USER,
    )
    .await
}

/// Publishes a rate for every karat: 18K 200, 21K 250, 22K 260, 24K 280.
pub async fn set_test_rates(db: &DatabaseConnection) -> Result<()> {
    for (karat, rate) in [
        (Karat::K18, "200"),
        (Karat::K21, "250"),
        (Karat::K22, "260"),
        (Karat::K24, "280"),
    ] {
        gold_rate::set_gold_rate(db, karat, dec(rate), TEST_USER).await?;
    }
    Ok(())
}

/// Creates a default 5% tax rate.
pub async fn create_test_tax(db: &DatabaseConnection) -> Result<entities::tax_rate::Model> {
    tax::create_tax_rate(db, "VAT".to_string(), dec("5"), None, TEST_USER).await
}

/// Opens a treasury account for the branch.
pub async fn create_test_treasury(
    db: &DatabaseConnection,
    branch_id: i64,
    opening_balance: &str,
) -> Result<entities::treasury_account::Model> {
    treasury::open_account(db, branch_id, dec(opening_balance), "AED", TEST_USER).await
}

/// Sets up a branch with rates, a 5% tax and two 21K products (10g and 5g).
/// Returns (db, branch, products).
pub async fn setup_with_stock() -> Result<(
    DatabaseConnection,
    entities::branch::Model,
    Vec<entities::product::Model>,
)> {
    let db = setup_test_db().await?;
    let branch = create_test_branch(&db, "Main").await?;
    set_test_rates(&db).await?;
    create_test_tax(&db).await?;
    let ring = create_test_product(&db, branch.id, "RING-1", Karat::K21, "10").await?;
    let chain = create_test_product(&db, branch.id, "CHAIN-1", Karat::K21, "5").await?;
    Ok((db, branch, vec![ring, chain]))
}

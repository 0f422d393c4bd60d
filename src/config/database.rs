//! Database configuration module.
//!
//! This module handles database connections and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs
//! without hand-written SQL. Tables are created parents first so that foreign keys
//! resolve.

use crate::entities::{
    Branch, CashDrawerBalance, Customer, FinancialTransaction, GoldRate, Order, OrderItem,
    Product, RawGoldOwnership, Supplier, SupplierGoldBalance, TaxRate, TreasuryAccount,
    TreasuryTransaction,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

/// Used when `DATABASE_URL` is not set
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/gold_ledger.sqlite?mode=rwc";

/// Gets the database URL from the environment or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection using `DATABASE_URL`, falling back to the local `SQLite` file.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    info!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    debug!("Creating table {}", entity.table_name());
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates every table, skipping the ones that already exist.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Branch).await?;
    create_table(db, &schema, Supplier).await?;
    create_table(db, &schema, Customer).await?;
    create_table(db, &schema, GoldRate).await?;
    create_table(db, &schema, TaxRate).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;
    create_table(db, &schema, FinancialTransaction).await?;
    create_table(db, &schema, RawGoldOwnership).await?;
    create_table(db, &schema, SupplierGoldBalance).await?;
    create_table(db, &schema, TreasuryAccount).await?;
    create_table(db, &schema, TreasuryTransaction).await?;
    create_table(db, &schema, CashDrawerBalance).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BranchModel, OrderItemModel, ProductModel, TreasuryTransactionModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<BranchModel> = Branch::find().limit(1).all(&db).await?;
        let _: Vec<ProductModel> = Product::find().limit(1).all(&db).await?;
        let _: Vec<OrderItemModel> = OrderItem::find().limit(1).all(&db).await?;
        let _: Vec<TreasuryTransactionModel> =
            TreasuryTransaction::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}

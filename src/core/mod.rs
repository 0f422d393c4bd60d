/// Branch management operations
pub mod branch;
/// Daily cash drawer open, close and settlement
pub mod cash_drawer;
/// Customer management operations
pub mod customer;
/// Publishing and reading gold rates
pub mod gold_rate;
/// Sales, repairs, returns and cancellations
pub mod order;
/// Pure price calculations
pub mod pricing;
/// Product management operations
pub mod product;
/// Raw gold receipts and supplier payments
pub mod raw_gold;
/// Start-up seeding from config.toml
pub mod seed;
/// Supplier management operations
pub mod supplier;
/// Supplier gold balances
pub mod supplier_balance;
/// Tax rate management and lookup
pub mod tax;
/// Branch treasury ledgers
pub mod treasury;

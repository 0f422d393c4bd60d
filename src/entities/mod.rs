//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod branch;
pub mod cash_drawer_balance;
pub mod customer;
pub mod financial_transaction;
pub mod gold_rate;
pub mod lookups;
pub mod order;
pub mod order_item;
pub mod product;
pub mod raw_gold_ownership;
pub mod supplier;
pub mod supplier_gold_balance;
pub mod tax_rate;
pub mod treasury_account;
pub mod treasury_transaction;

// Re-export specific types to avoid conflicts
pub use branch::{Entity as Branch, Model as BranchModel};
pub use cash_drawer_balance::{Entity as CashDrawerBalance, Model as CashDrawerBalanceModel};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use financial_transaction::{
    Entity as FinancialTransaction, Model as FinancialTransactionModel,
};
pub use gold_rate::{Entity as GoldRate, Model as GoldRateModel};
pub use lookups::{
    Direction, DrawerStatus, FinancialStatus, Karat, MakingChargeKind, OrderStatus, OrderType,
    PaymentMethod, ProductStatus, TreasuryTransactionType,
};
pub use order::{Entity as Order, Model as OrderModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use raw_gold_ownership::{Entity as RawGoldOwnership, Model as RawGoldOwnershipModel};
pub use supplier::{Entity as Supplier, Model as SupplierModel};
pub use supplier_gold_balance::{Entity as SupplierGoldBalance, Model as SupplierGoldBalanceModel};
pub use tax_rate::{Entity as TaxRate, Model as TaxRateModel};
pub use treasury_account::{Entity as TreasuryAccount, Model as TreasuryAccountModel};
pub use treasury_transaction::{Entity as TreasuryTransaction, Model as TreasuryTransactionModel};

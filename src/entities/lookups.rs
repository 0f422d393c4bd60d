//! Lookup values stored as short strings.
//!
//! These replace free-form status strings so that every column holding a karat, status or
//! direction only ever contains one of a known set of values.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gold purity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum Karat {
    /// 18 parts gold out of 24
    #[sea_orm(string_value = "18K")]
    #[serde(rename = "18K")]
    K18,
    /// 21 parts gold out of 24
    #[sea_orm(string_value = "21K")]
    #[serde(rename = "21K")]
    K21,
    /// 22 parts gold out of 24
    #[sea_orm(string_value = "22K")]
    #[serde(rename = "22K")]
    K22,
    /// Pure gold
    #[sea_orm(string_value = "24K")]
    #[serde(rename = "24K")]
    K24,
}

impl Karat {
    /// Every supported karat, lowest purity first
    pub const ALL: [Self; 4] = [Self::K18, Self::K21, Self::K22, Self::K24];

    /// Parts of gold out of 24
    #[must_use]
    pub const fn parts(self) -> u32 {
        match self {
            Self::K18 => 18,
            Self::K21 => 21,
            Self::K22 => 22,
            Self::K24 => 24,
        }
    }

    /// Purity as a fraction of pure gold (`parts / 24`)
    #[must_use]
    pub fn purity(self) -> Decimal {
        Decimal::from(self.parts()) / Decimal::from(24)
    }

    /// Display code such as `"21K"`
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::K18 => "18K",
            Self::K21 => "21K",
            Self::K22 => "22K",
            Self::K24 => "24K",
        }
    }
}

impl fmt::Display for Karat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Karat {
    type Err = Error;

    /// Accepts `"21K"`, `"21k"` and `"21"`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('K')
            .or_else(|| trimmed.strip_suffix('k'))
            .unwrap_or(trimmed);
        match digits {
            "18" => Ok(Self::K18),
            "21" => Ok(Self::K21),
            "22" => Ok(Self::K22),
            "24" => Ok(Self::K24),
            _ => Err(Error::validation(format!("Unknown karat: {s}"))),
        }
    }
}

/// Stock state of a finished piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ProductStatus {
    /// On the shelf
    #[sea_orm(string_value = "Available")]
    Available,
    /// Sold; frozen except for soft-delete
    #[sea_orm(string_value = "Sold")]
    Sold,
}

/// How a making charge is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MakingChargeKind {
    /// Flat amount per piece
    #[sea_orm(string_value = "Fixed")]
    Fixed,
    /// Amount per gram of gold
    #[sea_orm(string_value = "PerGram")]
    PerGram,
}

/// Kind of order
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum OrderType {
    /// Sale of finished pieces
    #[sea_orm(string_value = "Sale")]
    Sale,
    /// Refund of pieces from an earlier sale
    #[sea_orm(string_value = "Return")]
    Return,
    /// Repair work, optionally with added gold
    #[sea_orm(string_value = "Repair")]
    Repair,
}

/// Lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum OrderStatus {
    /// Paid and posted
    #[sea_orm(string_value = "Completed")]
    Completed,
    /// Voided after posting
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
    /// Every item has been returned
    #[sea_orm(string_value = "Returned")]
    Returned,
}

/// Tender used to settle an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentMethod {
    /// Notes and coins through the cash drawer
    #[sea_orm(string_value = "Cash")]
    Cash,
    /// Card terminal
    #[sea_orm(string_value = "Card")]
    Card,
    /// Bank transfer
    #[sea_orm(string_value = "BankTransfer")]
    BankTransfer,
}

/// Posting state of a financial transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum FinancialStatus {
    /// Counts towards balances
    #[sea_orm(string_value = "Posted")]
    Posted,
    /// Kept for history only
    #[sea_orm(string_value = "Voided")]
    Voided,
}

/// Sign of a treasury movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum Direction {
    /// Money in
    #[sea_orm(string_value = "Credit")]
    Credit,
    /// Money out
    #[sea_orm(string_value = "Debit")]
    Debit,
}

impl Direction {
    /// Applies the direction to a positive amount
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Credit => amount,
            Self::Debit => -amount,
        }
    }

    /// The direction that undoes this one
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Credit => Self::Debit,
            Self::Debit => Self::Credit,
        }
    }
}

/// Reason for a treasury movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum TreasuryTransactionType {
    /// Balance brought in when the account was opened
    #[sea_orm(string_value = "Opening")]
    Opening,
    /// Opening float handed to a cash drawer
    #[sea_orm(string_value = "DrawerFloat")]
    DrawerFloat,
    /// Cash handed over from a settled drawer
    #[sea_orm(string_value = "DrawerSettlement")]
    DrawerSettlement,
    /// Payment of outstanding raw gold cost
    #[sea_orm(string_value = "SupplierPayment")]
    SupplierPayment,
    /// Money moved between branches
    #[sea_orm(string_value = "Transfer")]
    Transfer,
    /// Manual deposit
    #[sea_orm(string_value = "Deposit")]
    Deposit,
    /// Manual withdrawal
    #[sea_orm(string_value = "Withdrawal")]
    Withdrawal,
    /// Reversing entry for an earlier transaction
    #[sea_orm(string_value = "Reversal")]
    Reversal,
}

/// Daily drawer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DrawerStatus {
    /// Taking cash
    #[sea_orm(string_value = "Open")]
    Open,
    /// Counted
    #[sea_orm(string_value = "Closed")]
    Closed,
    /// Counted cash handed to treasury
    #[sea_orm(string_value = "Settled")]
    Settled,
}

//! Seed configuration loading from config.toml
//!
//! Branches, tax rates and opening gold rates listed in config.toml are written to the
//! database on start-up when they are missing.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Used when `GOLD_LEDGER_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct SeedConfig {
    /// Branches to create
    #[serde(default)]
    pub branches: Vec<BranchConfig>,
    /// Tax rates to create
    #[serde(default)]
    pub tax_rates: Vec<TaxRateConfig>,
    /// Opening gold rates
    #[serde(default)]
    pub gold_rates: Vec<GoldRateConfig>,
}

/// A branch to seed
#[derive(Debug, Deserialize, Clone)]
pub struct BranchConfig {
    /// Display name
    pub name: String,
    /// Unique code
    pub code: String,
    /// Opening treasury balance; no account is opened when absent
    #[serde(default)]
    pub treasury_opening_balance: Option<Decimal>,
}

/// A tax rate to seed
#[derive(Debug, Deserialize, Clone)]
pub struct TaxRateConfig {
    /// Unique name
    pub name: String,
    /// Percentage
    pub percent: Decimal,
    /// Category the rate is limited to
    #[serde(default)]
    pub category: Option<String>,
}

/// An opening gold rate
#[derive(Debug, Deserialize, Clone)]
pub struct GoldRateConfig {
    /// Karat code such as `"21K"`
    pub karat: String,
    /// Price per gram
    pub rate_per_gram: Decimal,
}

/// Parses seed configuration from TOML text
pub fn parse_config(contents: &str) -> Result<SeedConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads seed configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads seed configuration from `GOLD_LEDGER_CONFIG` or `./config.toml`
pub fn load_default_config() -> Result<SeedConfig> {
    let path =
        std::env::var("GOLD_LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}

//! Start-up seeding from config.toml.
//!
//! Seeding only ever adds what is missing, so it is safe to run on every start.

use crate::{
    config::seed::SeedConfig,
    core::{branch, gold_rate, tax, treasury},
    entities::Karat,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, instrument, warn};

/// Currency of treasury accounts opened by seeding
pub const DEFAULT_CURRENCY: &str = "AED";

/// What a seeding run created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    /// New branches
    pub branches_created: usize,
    /// New treasury accounts
    pub treasury_accounts_opened: usize,
    /// New tax rates
    pub tax_rates_created: usize,
    /// Karats that got their first rate
    pub gold_rates_set: usize,
}

/// Writes the branches, treasury accounts, tax rates and gold rates from the config
/// that do not exist yet.
///
/// Existing branch codes and tax names are left alone, and a gold rate is only set for
/// a karat that has no current rate.
///
/// # Errors
/// Returns an error if a configured karat is unknown or any write fails.
#[instrument(skip(db, config))]
pub async fn apply_seed(
    db: &DatabaseConnection,
    config: &SeedConfig,
    user: &str,
) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for cfg in &config.branches {
        let existing = branch::get_branch_by_code(db, cfg.code.trim()).await?;
        let branch = match existing {
            Some(branch) => {
                debug!(code = %cfg.code, "Branch already exists, skipping");
                branch
            }
            None => match branch::create_branch(db, cfg.name.clone(), cfg.code.clone(), user).await
            {
                Ok(branch) => {
                    summary.branches_created += 1;
                    branch
                }
                Err(Error::DuplicateEntity { key, .. }) => {
                    warn!(code = %key, "Branch code belongs to a deleted branch, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            },
        };

        if let Some(opening) = cfg.treasury_opening_balance {
            if treasury::get_account_for_branch(db, branch.id).await?.is_none() {
                treasury::open_account(db, branch.id, opening, DEFAULT_CURRENCY, user).await?;
                summary.treasury_accounts_opened += 1;
            }
        }
    }

    for cfg in &config.tax_rates {
        if tax::get_tax_rate_by_name(db, cfg.name.trim()).await?.is_some() {
            debug!(name = %cfg.name, "Tax rate already exists, skipping");
            continue;
        }
        tax::create_tax_rate(db, cfg.name.clone(), cfg.percent, cfg.category.clone(), user)
            .await?;
        summary.tax_rates_created += 1;
    }

    for cfg in &config.gold_rates {
        let karat: Karat = cfg.karat.parse()?;
        if gold_rate::get_current_rate(db, karat).await?.is_some() {
            debug!(%karat, "Gold rate already set, skipping");
            continue;
        }
        gold_rate::set_gold_rate(db, karat, cfg.rate_per_gram, user).await?;
        summary.gold_rates_set += 1;
    }

    info!(?summary, "Applied seed configuration");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::seed::parse_config;
    use crate::test_utils::*;

    const CONFIG: &str = r#"
        [[branches]]
        name = "Main Souk"
        code = "MAIN"
        treasury_opening_balance = "25000"

        [[branches]]
        name = "Mall"
        code = "MALL"

        [[tax_rates]]
        name = "VAT"
        percent = "5"

        [[gold_rates]]
        karat = "24K"
        rate_per_gram = "280.50"

        [[gold_rates]]
        karat = "21"
        rate_per_gram = "245.44"
    "#;

    #[tokio::test]
    async fn test_apply_seed_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(CONFIG)?;

        let first = apply_seed(&db, &config, "system").await?;
        assert_eq!(
            first,
            SeedSummary {
                branches_created: 2,
                treasury_accounts_opened: 1,
                tax_rates_created: 1,
                gold_rates_set: 2,
            }
        );

        let second = apply_seed(&db, &config, "system").await?;
        assert_eq!(second, SeedSummary::default());

        let main = branch::get_branch_by_code(&db, "MAIN").await?;
        let account = treasury::get_account_for_branch(&db, main.map_or(0, |b| b.id)).await?;
        assert_eq!(account.map(|a| a.balance), Some(dec("25000")));

        let rate = gold_rate::get_current_rate(&db, Karat::K21).await?;
        assert_eq!(rate.map(|r| r.rate_per_gram), Some(dec("245.44")));

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_seed_keeps_published_rates() -> Result<()> {
        let db = setup_test_db().await?;
        gold_rate::set_gold_rate(&db, Karat::K24, dec("300"), TEST_USER).await?;

        let summary = apply_seed(&db, &parse_config(CONFIG)?, "system").await?;
        assert_eq!(summary.gold_rates_set, 1);

        let rate = gold_rate::get_current_rate(&db, Karat::K24).await?;
        assert_eq!(rate.map(|r| r.rate_per_gram), Some(dec("300")));

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_seed_rejects_unknown_karat() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[gold_rates]]
            karat = "14K"
            rate_per_gram = "150"
            "#,
        )?;

        let result = apply_seed(&db, &config, "system").await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }
}

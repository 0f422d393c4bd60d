use dotenvy::dotenv;
use gold_ledger::{
    config::{database, seed},
    core::{gold_rate, seed::apply_seed},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Audit user recorded on rows written during start-up
const SYSTEM_USER: &str = "system";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the seed configuration
    let seed_config = seed::load_default_config()
        .inspect_err(|e| error!("Failed to load seed configuration: {}", e))?;

    // 4. Connect and create tables
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed branches, tax rates and opening gold rates
    let summary = apply_seed(&db, &seed_config, SYSTEM_USER)
        .await
        .inspect_err(|e| error!("Failed to apply seed configuration: {}", e))?;
    info!(?summary, "Seed configuration applied.");

    // 6. Report the rates sales will be priced at
    for rate in gold_rate::get_current_rates(&db).await? {
        info!(karat = %rate.karat, rate_per_gram = %rate.rate_per_gram, "Current gold rate");
    }

    Ok(())
}

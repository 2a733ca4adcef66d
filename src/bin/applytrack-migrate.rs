//! # ApplyTrack Migration Runner
//!
//! Loads configuration for the current environment and applies the embedded schema
//! migrations to the configured database.
//!
//! ```bash
//! applytrack-migrate                # environment from APPLYTRACK_ENV / APP_ENV
//! applytrack-migrate production     # explicit environment
//! ```

use anyhow::Context;
use applytrack_core::config::ConfigManager;
use applytrack_core::database::migrator;
use applytrack_core::logging::{get_environment, init_with_config, log_error};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = std::env::args().nth(1).unwrap_or_else(get_environment);

    let manager = ConfigManager::load_from_directory_with_env(None, &environment)
        .with_context(|| format!("loading configuration for '{environment}'"))?;
    init_with_config(&manager.config().telemetry);

    let database = &manager.config().database;
    info!(
        environment = %manager.environment(),
        config_directory = %manager.config_directory().display(),
        "Applying migrations"
    );

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await
        .context("connecting to database")?;

    if let Err(e) = migrator::run_migrations(&pool).await {
        log_error("migrate", "run_migrations", &e.to_string(), Some(&environment));
        return Err(e).context("running migrations");
    }

    pool.close().await;
    info!("Database schema is up to date");
    Ok(())
}

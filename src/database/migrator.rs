//! # Database Migration Support
//!
//! The schema lives in the crate's `migrations/` directory and is embedded at compile time.
//!
//! ```rust,ignore
//! #[sqlx::test(migrator = "applytrack_core::database::MIGRATOR")]
//! async fn test_something(pool: PgPool) { /* ... */ }
//! ```

use sqlx::PgPool;
use tracing::info;

/// Migrator for the status tracking tables
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Result type for migration operations
pub type MigrationResult<T> = Result<T, sqlx::migrate::MigrateError>;

/// Apply any pending migrations
pub async fn run_migrations(pool: &PgPool) -> MigrationResult<()> {
    info!("Running status tracking migrations");
    MIGRATOR.run(pool).await?;
    info!("Migrations complete");
    Ok(())
}

//! # Database Operations
//!
//! Storage backends for the transition engine.
//!
//! - [`postgres`] - [`PgStatusStore`], the SQLx implementation of every storage trait
//! - [`memory`] - [`InMemoryStore`], a single-process implementation with the same
//!   transactional contract
//! - [`migrator`] - embedded schema migrations
//!
//! Both stores implement `EntityStore`, `StatusConfigStore` and `AnalyticsSource`, so
//! services are written once against the traits.

pub mod memory;
pub mod migrator;
pub mod postgres;

pub use memory::{InMemoryStore, MemoryTx};
pub use migrator::MIGRATOR;
pub use postgres::PgStatusStore;

use crate::config::DatabaseConfig;
use crate::models::TrendPoint;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::cmp::Reverse;
use tracing::info;

/// Build a connection pool from configuration, running migrations when asked to
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        run_migrations = config.run_migrations,
        "Database pool created"
    );

    if config.run_migrations {
        migrator::run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Newest day first, then highest count, then vocabulary order
pub(crate) fn order_trend_points(points: &mut [TrendPoint]) {
    points.sort_by_key(|p| (Reverse(p.date), Reverse(p.count), p.status));
}

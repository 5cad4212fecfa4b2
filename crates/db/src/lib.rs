pub mod rooms;
pub mod sync;

use std::time::Duration;

use canopy_common::error::{CanopyError, CanopyResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
///
/// The sync service is a short-lived batch job, so callers size the pool from
/// config instead of a one-size default.
pub async fn create_pool(database_url: &str, max_connections: u32) -> CanopyResult<PgPool> {
    tracing::info!(max_connections, "connecting to database");
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))
}

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Creates a PostgreSQL connection pool for the movie catalog
///
/// The catalog is read-only, so the pool is sized for concurrent reads.
/// Acquiring a connection is bounded by `acquire_timeout` so a saturated pool
/// surfaces as a catalog error instead of a hung request.
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;

    Ok(pool)
}

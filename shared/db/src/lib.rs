use shared_error::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Initialize database connection pool
pub async fn init_pool(
    database_url: &str,
    min_connections: u32,
    max_connections: u32,
) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))
}

/// Connect with the configured pool; fall back to a single direct connection
/// when the pool cannot be established.
///
/// Connections are health-checked on acquisition, so a connection broken by a
/// failed transaction is closed rather than handed back out.
pub async fn connect_with_fallback(
    database_url: &str,
    min_connections: u32,
    max_connections: u32,
) -> Result<PgPool, AppError> {
    match init_pool(database_url, min_connections, max_connections).await {
        Ok(pool) => Ok(pool),
        Err(pool_error) => {
            tracing::warn!(
                error = %pool_error,
                "connection pool initialization failed, falling back to a direct connection"
            );
            PgPoolOptions::new()
                .min_connections(0)
                .max_connections(1)
                .test_before_acquire(true)
                .connect(database_url)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to connect to database: {}", e))
                })
        }
    }
}

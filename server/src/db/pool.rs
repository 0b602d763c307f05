//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Type alias for the database pool.
pub type Pool = PgPool;

const MAX_CONNECTIONS: u32 = 10;

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
}

/// Connect to PostgreSQL.
pub async fn create_pool(database_url: &str) -> Result<Pool, sqlx::Error> {
    pool_options().connect(database_url).await
}

/// Build a pool that only connects on first use.
pub fn create_lazy_pool(database_url: &str) -> Result<Pool, sqlx::Error> {
    pool_options().connect_lazy(database_url)
}

/// Run database migrations.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

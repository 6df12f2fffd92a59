use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;
use tracing::info;

pub async fn connect(
    dsn: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<MySqlPool> {
    info!("connecting to mysql");

    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .idle_timeout(Duration::from_secs(600))
        .connect(dsn)
        .await
        .context("connect to mysql")?;

    info!("mysql pool created");
    Ok(pool)
}

/// Apply `migrations/` (the `refresh_token` table).
pub async fn run_migrations(pool: &MySqlPool) -> Result<()> {
    info!("running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")?;

    info!("database migrations completed");
    Ok(())
}

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection
    pub acquire_timeout: Duration,
    /// Maximum idle time before a connection is closed
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // The scheduler runs checks one after another, so a small pool is enough.
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600), // 10 minutes
        }
    }
}

impl PoolConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = std::env::var("DB_MAX_CONNECTIONS").ok().and_then(|v| v.parse().ok()) {
            config.max_connections = n;
        }

        if let Some(n) = std::env::var("DB_MIN_CONNECTIONS").ok().and_then(|v| v.parse().ok()) {
            config.min_connections = n;
        }

        if let Some(n) = std::env::var("DB_ACQUIRE_TIMEOUT").ok().and_then(|v| v.parse().ok()) {
            config.acquire_timeout = Duration::from_secs(n);
        }

        if let Some(n) = std::env::var("DB_IDLE_TIMEOUT").ok().and_then(|v| v.parse().ok()) {
            config.idle_timeout = Duration::from_secs(n);
        }

        config
    }
}

/// Create a database connection pool with configuration from the environment
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::from_env()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    tracing::info!(
        "Database pool created: max={}, min={}, acquire_timeout={}s",
        config.max_connections,
        config.min_connections,
        config.acquire_timeout.as_secs()
    );

    Ok(pool)
}

/// Check database health
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

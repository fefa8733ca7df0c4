//! Database module: connection pool and migrations.

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::{Error, Result};

/// Database connection and lifecycle operations.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool, lazily connected.
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        tracing::info!(max_connections, "database pool configured");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }

    /// Create from an existing pool (used by tests against a testcontainer).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Verify connectivity and run pending migrations.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("failed to connect: {e}")))?;

        self.run_migrations().await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("failed to run migrations: {e}")))?;

        Ok(())
    }

    /// Health check used by liveness probes.
    pub async fn health_check(&self) -> HealthStatus {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => HealthStatus {
                is_healthy: true,
                message: "connected".to_string(),
            },
            Err(e) => HealthStatus {
                is_healthy: false,
                message: format!("connection failed: {e}"),
            },
        }
    }
}

/// Health status for the database.
#[derive(Debug, PartialEq, Eq)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub message: String,
}

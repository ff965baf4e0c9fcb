//! Postgres sink over a sqlx connection pool

use super::{InsertStatement, RecordSink, Row};
use crate::config::ConnConfig;
use crate::error::{IngestError, Result};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::{info, trace};

/// Seconds to wait for a pooled connection
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// The workspace `migrations/` directory, compiled into the binary
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Postgres sink over a shared connection pool
#[derive(Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    /// Connect and verify the database answers
    pub async fn connect(conn: &ConnConfig) -> anyhow::Result<Self> {
        info!("Connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(conn.max_connections)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect(&conn.dsn)
            .await
            .context("Failed to connect to database")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Database did not answer ping")?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the built-in migrations that create the feed tables
    pub async fn run_embedded_migrations(&self) -> anyhow::Result<()> {
        info!("Running built-in migrations");

        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Apply every pending migration found in `dir`
    pub async fn run_migrations(&self, dir: &Path) -> anyhow::Result<()> {
        info!("Running migrations from {}", dir.display());

        let migrator = Migrator::new(dir)
            .await
            .with_context(|| format!("Failed to read migrations from {}", dir.display()))?;

        migrator
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl RecordSink for PgSink {
    async fn insert(&self, statement: &InsertStatement, row: Row) -> Result<()> {
        statement.check_row(&row)?;

        trace!(table = statement.table(), ?row, "Inserting");

        let mut query = sqlx::query(statement.sql());
        for value in row {
            query = query.bind(value);
        }

        query
            .execute(&self.pool)
            .await
            .map_err(|source| IngestError::Database {
                table: statement.table().to_string(),
                source,
            })?;

        Ok(())
    }
}

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::sql::Statements;
use crate::store::{ElementTable, QueueTable, Store};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

pub mod tables;

use self::tables::{PostgresElementTable, PostgresQueueTable};

const CHECK_TABLE_EXISTS: &str = r#"
    SELECT COUNT(*) FROM information_schema.tables
    WHERE table_schema = current_schema() AND table_name = $1
"#;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    config: Config,
    stmts: Arc<Statements>,
    queues: Arc<PostgresQueueTable>,
    elements: Arc<PostgresElementTable>,
}

impl PostgresStore {
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&config.dsn)
            .await
            .map_err(|e| Error::ConnectionFailed {
                source: Box::new(e),
                context: "Failed to connect to postgres".into(),
            })?;

        Ok(Self::from_pool(pool, config))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, config: &Config) -> Self {
        let stmts = Arc::new(Statements::new(config));
        Self {
            queues: Arc::new(PostgresQueueTable::new(pool.clone(), stmts.clone())),
            elements: Arc::new(PostgresElementTable::new(pool.clone(), stmts.clone())),
            pool,
            config: config.clone(),
            stmts,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute_ddl(&self, sql: &str, label: &str) -> Result<()> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::query_failed(label, "Failed to execute schema statement", e))?;
        Ok(())
    }

    async fn table_exists(&self, raw_name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(CHECK_TABLE_EXISTS)
            .bind(raw_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("CHECK_TABLE_EXISTS ({})", raw_name),
                    "Failed to inspect information_schema",
                    e,
                )
            })?;
        Ok(count > 0)
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn config(&self) -> &Config {
        &self.config
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn queues(&self) -> &dyn QueueTable {
        self.queues.as_ref()
    }

    fn elements(&self) -> &dyn ElementTable {
        self.elements.as_ref()
    }

    async fn install(&self) -> Result<()> {
        let create_queues = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                queue_id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
            self.stmts.queues_table
        );
        let create_elements = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                element_id BIGSERIAL PRIMARY KEY,
                queue_id BIGINT NOT NULL REFERENCES {}(queue_id) ON DELETE CASCADE,
                payload TEXT NOT NULL,
                lock_time BIGINT,
                requeue_count BIGINT NOT NULL DEFAULT 0,
                created BIGINT NOT NULL
            )",
            self.stmts.elements_table, self.stmts.queues_table
        );

        self.execute_ddl(&create_queues, "CREATE_QUEUES_TABLE").await?;
        self.execute_ddl(&create_elements, "CREATE_ELEMENTS_TABLE")
            .await?;
        self.execute_ddl(&self.stmts.create_queue_scan_index, "CREATE_QUEUE_SCAN_INDEX")
            .await?;
        self.execute_ddl(&self.stmts.create_lock_time_index, "CREATE_LOCK_TIME_INDEX")
            .await?;
        tracing::debug!(
            "Installed tables {} and {}",
            self.stmts.queues_table,
            self.stmts.elements_table
        );
        Ok(())
    }

    async fn verify(&self) -> Result<()> {
        for table in [&self.stmts.queues_table_raw, &self.stmts.elements_table_raw] {
            if !self.table_exists(table).await? {
                return Err(Error::SchemaValidation {
                    message: format!("Table '{}' does not exist", table),
                });
            }
        }

        let orphans: i64 = sqlx::query_scalar(&self.stmts.count_orphaned_elements)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed("COUNT_ORPHANED_ELEMENTS", "Failed to check references", e)
            })?;
        if orphans > 0 {
            return Err(Error::SchemaValidation {
                message: format!("{} elements reference a missing queue", orphans),
            });
        }
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        self.execute_ddl(&self.stmts.drop_elements, "DROP_ELEMENTS_TABLE")
            .await?;
        self.execute_ddl(&self.stmts.drop_queues, "DROP_QUEUES_TABLE")
            .await?;
        Ok(())
    }
}

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::sql::Statements;
use crate::store::{ElementTable, QueueTable, Store};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod tables;

use self::tables::{SqliteElementTable, SqliteQueueTable};

const CHECK_TABLE_EXISTS: &str = r#"
    SELECT COUNT(*) FROM sqlite_master
    WHERE type = 'table' AND name = $1
"#;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    config: Config,
    stmts: Arc<Statements>,
    queues: Arc<SqliteQueueTable>,
    elements: Arc<SqliteElementTable>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    ///
    /// Every pooled connection gets:
    /// - WAL mode enabled so readers do not block the single writer
    /// - 5s busy timeout, so concurrent conditional writes queue instead of failing
    /// - Foreign Keys enforced
    ///
    /// An in-memory database lives inside one connection, so `:memory:` DSNs get a pool of one.
    pub async fn new(config: &Config) -> Result<Self> {
        let in_memory = config.dsn.contains(":memory:") || config.dsn.contains("mode=memory");

        let options = SqliteConnectOptions::from_str(&config.dsn)
            .map_err(|e| Error::ConnectionFailed {
                source: Box::new(e),
                context: "Invalid SQLite DSN".into(),
            })?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            pool_options.max_connections(config.max_connections.max(1))
        };

        let pool = pool_options
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout=5000")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA foreign_keys=ON")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(|e| Error::ConnectionFailed {
                source: Box::new(e),
                context: "Failed to connect to sqlite".into(),
            })?;

        Ok(Self::from_pool(pool, config))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool, config: &Config) -> Self {
        let stmts = Arc::new(Statements::new(config));
        Self {
            queues: Arc::new(SqliteQueueTable::new(pool.clone(), stmts.clone())),
            elements: Arc::new(SqliteElementTable::new(pool.clone(), stmts.clone())),
            pool,
            config: config.clone(),
            stmts,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn statements(&self) -> Arc<Statements> {
        self.stmts.clone()
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
                    "Failed to inspect sqlite_master",
                    e,
                )
            })?;
        Ok(count > 0)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn config(&self) -> &Config {
        &self.config
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
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
                queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )",
            self.stmts.queues_table
        );
        let create_elements = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                element_id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue_id INTEGER NOT NULL REFERENCES {}(queue_id) ON DELETE CASCADE,
                payload TEXT NOT NULL,
                lock_time INTEGER,
                requeue_count INTEGER NOT NULL DEFAULT 0,
                created INTEGER NOT NULL
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

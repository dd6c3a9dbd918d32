use crate::error::{Error, Result};
use crate::store::sql::Statements;
use crate::types::QueueRecord;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SqliteQueueTable {
    pool: SqlitePool,
    stmts: Arc<Statements>,
}

impl SqliteQueueTable {
    pub fn new(pool: SqlitePool, stmts: Arc<Statements>) -> Self {
        Self { pool, stmts }
    }

    fn map_row(row: sqlx::sqlite::SqliteRow) -> Result<QueueRecord> {
        Ok(QueueRecord {
            queue_id: row.try_get("queue_id")?,
            name: row.try_get("name")?,
        })
    }
}

#[async_trait]
impl crate::store::QueueTable for SqliteQueueTable {
    async fn insert(&self, name: &str) -> Result<QueueRecord> {
        let row = sqlx::query(&self.stmts.insert_queue)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return Error::QueueAlreadyExists {
                            name: name.to_string(),
                        };
                    }
                }
                Error::query_failed(
                    format!("INSERT_QUEUE ({})", name),
                    format!("Failed to create queue '{}'", name),
                    e,
                )
            })?;

        Self::map_row(row)
    }

    async fn get_by_name(&self, name: &str) -> Result<QueueRecord> {
        let row = sqlx::query(&self.stmts.get_queue_by_name)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("GET_QUEUE_BY_NAME ({})", name),
                    format!("Failed to resolve queue '{}'", name),
                    e,
                )
            })?;

        match row {
            Some(row) => Self::map_row(row),
            None => Err(Error::QueueNotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(&self.stmts.count_queue_by_name)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("CHECK_QUEUE_EXISTS ({})", name),
                    format!("Failed to check if queue '{}' exists", name),
                    e,
                )
            })?;
        Ok(count > 0)
    }

    async fn list(&self) -> Result<Vec<QueueRecord>> {
        let rows = sqlx::query(&self.stmts.list_queues)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::query_failed("LIST_QUEUES", "Failed to list queues", e))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn delete_by_name(&self, name: &str) -> Result<u64> {
        let result = sqlx::query(&self.stmts.delete_queue_by_name)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("DELETE_QUEUE_BY_NAME ({})", name),
                    format!("Failed to delete queue '{}'", name),
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }
}

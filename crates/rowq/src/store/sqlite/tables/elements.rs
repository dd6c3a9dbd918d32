use crate::error::{Error, Result};
use crate::store::sql::Statements;
use crate::store::ScanWindow;
use crate::types::{ElementRecord, NewElement, QueueMetrics, QueueRecord};
use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SqliteElementTable {
    pool: SqlitePool,
    stmts: Arc<Statements>,
}

impl SqliteElementTable {
    pub fn new(pool: SqlitePool, stmts: Arc<Statements>) -> Self {
        Self { pool, stmts }
    }

    pub fn map_row(row: sqlx::sqlite::SqliteRow) -> Result<ElementRecord> {
        Ok(ElementRecord {
            element_id: row.try_get("element_id")?,
            queue_id: row.try_get("queue_id")?,
            payload: row.try_get("payload")?,
            lock_time: row.try_get("lock_time")?,
            requeue_count: row.try_get("requeue_count")?,
            created: row.try_get("created")?,
        })
    }

    async fn execute_on_element(&self, sql: &str, label: &str, element_id: i64) -> Result<u64> {
        let result = sqlx::query(sql)
            .bind(element_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("{} ({})", label, element_id),
                    format!("Failed to apply {} to element {}", label, element_id),
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl crate::store::ElementTable for SqliteElementTable {
    async fn insert(&self, data: NewElement) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(&self.stmts.insert_element)
            .bind(data.queue_id)
            .bind(&data.payload)
            .bind(data.created)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    "INSERT_ELEMENT",
                    format!("Failed to insert element into queue {}", data.queue_id),
                    e,
                )
            })?;
        Ok(id)
    }

    async fn max_id(&self, queue_id: i64) -> Result<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar(&self.stmts.max_element_id)
            .bind(queue_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("MAX_ELEMENT_ID (queue_id={})", queue_id),
                    format!("Failed to read high-water mark of queue {}", queue_id),
                    e,
                )
            })?;
        Ok(max)
    }

    async fn fetch_window(&self, window: &ScanWindow) -> Result<Vec<ElementRecord>> {
        if matches!(&window.ids, Some(ids) if ids.is_empty()) {
            return Ok(vec![]);
        }

        let mut query_builder =
            sqlx::QueryBuilder::<Sqlite>::new(self.stmts.select_window_prefix.as_str());
        query_builder.push_bind(window.queue_id);
        query_builder.push(" AND lock_time IS NULL AND element_id > ");
        query_builder.push_bind(window.after_id);
        query_builder.push(" AND element_id <= ");
        query_builder.push_bind(window.up_to);
        if let Some(max) = window.max_requeue_count {
            query_builder.push(" AND requeue_count <= ");
            query_builder.push_bind(max);
        }
        if let Some(ids) = &window.ids {
            query_builder.push(" AND element_id IN (");
            let mut separated = query_builder.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }
        query_builder.push(" ORDER BY element_id ASC LIMIT ");
        query_builder.push_bind(window.limit);

        let rows = query_builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!(
                        "SELECT_WINDOW (queue_id={}, ids {}..={})",
                        window.queue_id,
                        window.after_id + 1,
                        window.up_to
                    ),
                    format!("Failed to scan queue {}", window.queue_id),
                    e,
                )
            })?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn get(&self, queue_id: i64, element_id: i64) -> Result<Option<ElementRecord>> {
        let row = sqlx::query(&self.stmts.get_element)
            .bind(element_id)
            .bind(queue_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("GET_ELEMENT ({})", element_id),
                    format!("Failed to get element {}", element_id),
                    e,
                )
            })?;
        row.map(Self::map_row).transpose()
    }

    async fn lock(&self, element_id: i64, now: i64) -> Result<u64> {
        let result = sqlx::query(&self.stmts.lock_element)
            .bind(now)
            .bind(element_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("LOCK_ELEMENT ({})", element_id),
                    format!("Failed to lock element {}", element_id),
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }

    async fn requeue(&self, element_id: i64) -> Result<u64> {
        self.execute_on_element(&self.stmts.requeue_element, "REQUEUE_ELEMENT", element_id)
            .await
    }

    async fn delete_locked(&self, element_id: i64) -> Result<u64> {
        self.execute_on_element(
            &self.stmts.delete_locked_element,
            "DELETE_LOCKED_ELEMENT",
            element_id,
        )
        .await
    }

    async fn delete(&self, element_id: i64) -> Result<u64> {
        self.execute_on_element(&self.stmts.delete_element, "DELETE_ELEMENT", element_id)
            .await
    }

    async fn locked_before(&self, queue_id: i64, threshold: i64) -> Result<Vec<ElementRecord>> {
        let rows = sqlx::query(&self.stmts.select_locked_before)
            .bind(queue_id)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("SELECT_LOCKED_BEFORE (queue_id={})", queue_id),
                    format!("Failed to find expired locks in queue {}", queue_id),
                    e,
                )
            })?;
        rows.into_iter().map(Self::map_row).collect()
    }

    async fn count(&self, queue_id: i64) -> Result<i64> {
        sqlx::query_scalar(&self.stmts.count_elements)
            .bind(queue_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("COUNT_ELEMENTS (queue_id={})", queue_id),
                    format!("Failed to count elements of queue {}", queue_id),
                    e,
                )
            })
    }

    async fn metrics(&self, queue: &QueueRecord) -> Result<QueueMetrics> {
        let row = sqlx::query(&self.stmts.element_metrics)
            .bind(queue.queue_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("ELEMENT_METRICS (queue_id={})", queue.queue_id),
                    format!("Failed to compute metrics for queue '{}'", queue.name),
                    e,
                )
            })?;

        Ok(QueueMetrics {
            name: queue.name.clone(),
            total_elements: row.try_get("total_elements")?,
            pending_elements: row.try_get("pending_elements")?,
            locked_elements: row.try_get("locked_elements")?,
            max_requeue_count: row.try_get("max_requeue_count")?,
        })
    }

    async fn purge(&self, queue_id: i64) -> Result<u64> {
        let result = sqlx::query(&self.stmts.purge_elements)
            .bind(queue_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::query_failed(
                    format!("PURGE_ELEMENTS (queue_id={})", queue_id),
                    format!("Failed to purge queue {}", queue_id),
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }
}

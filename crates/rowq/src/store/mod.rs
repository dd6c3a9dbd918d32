//! Backing store abstraction for rowq.
//!
//! This module defines the [`Store`] trait and its per-table repositories. The queue engine
//! needs only what is declared here: parameterized reads, single-statement conditional
//! writes that report affected-row counts, and identifier quoting. Backends live in
//! `sqlite` (default feature) and `postgres`; [`AnyStore`] picks one from the DSN.

use crate::config::Config;
use crate::error::Result;
use crate::types::{ElementRecord, NewElement, QueueMetrics, QueueRecord};
use async_trait::async_trait;

pub mod any;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use any::AnyStore;

/// Backend kind, detected from a DSN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    #[cfg(feature = "postgres")]
    Postgres,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl BackendType {
    /// Detect the backend from a DSN scheme.
    pub fn detect(dsn: &str) -> Result<Self> {
        #[cfg(feature = "postgres")]
        if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
            return Ok(BackendType::Postgres);
        }
        #[cfg(feature = "sqlite")]
        if dsn.starts_with("sqlite:") {
            return Ok(BackendType::Sqlite);
        }
        Err(crate::error::Error::InvalidConfig {
            field: "dsn".to_string(),
            message: format!(
                "Unsupported or disabled backend for DSN '{}'",
                dsn.split(':').next().unwrap_or_default()
            ),
        })
    }
}

/// The slice of an element table one `retrieve_batch` call may return.
///
/// Rows qualify when they belong to `queue_id`, are unlocked, have
/// `after_id < element_id <= up_to`, have not exceeded `max_requeue_count` (if set) and,
/// when `ids` is given, are one of those ids. Rows come back ascending by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWindow {
    pub queue_id: i64,
    pub after_id: i64,
    pub up_to: i64,
    pub max_requeue_count: Option<i64>,
    pub ids: Option<Vec<i64>>,
    pub limit: i64,
}

/// Repository for the queue identity table.
#[async_trait]
pub trait QueueTable: Send + Sync {
    /// Create a queue; fails with `QueueAlreadyExists` on a duplicate name.
    async fn insert(&self, name: &str) -> Result<QueueRecord>;
    /// Resolve a name; fails with `QueueNotFound`.
    async fn get_by_name(&self, name: &str) -> Result<QueueRecord>;
    async fn exists(&self, name: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<QueueRecord>>;
    async fn delete_by_name(&self, name: &str) -> Result<u64>;
}

/// Repository for the element table.
///
/// Every mutation touches at most one row, addressed by primary key, and returns the
/// affected-row count. Zero means another process got there first.
#[async_trait]
pub trait ElementTable: Send + Sync {
    async fn insert(&self, data: NewElement) -> Result<i64>;
    async fn max_id(&self, queue_id: i64) -> Result<Option<i64>>;
    async fn fetch_window(&self, window: &ScanWindow) -> Result<Vec<ElementRecord>>;
    async fn get(&self, queue_id: i64, element_id: i64) -> Result<Option<ElementRecord>>;
    /// `SET lock_time = now` where unlocked.
    async fn lock(&self, element_id: i64, now: i64) -> Result<u64>;
    /// Clear the lock and bump `requeue_count` where locked.
    async fn requeue(&self, element_id: i64) -> Result<u64>;
    /// Delete where locked.
    async fn delete_locked(&self, element_id: i64) -> Result<u64>;
    /// Delete regardless of lock state.
    async fn delete(&self, element_id: i64) -> Result<u64>;
    /// Rows of `queue_id` with `lock_time < threshold`, ascending by id.
    async fn locked_before(&self, queue_id: i64, threshold: i64) -> Result<Vec<ElementRecord>>;
    async fn count(&self, queue_id: i64) -> Result<i64>;
    async fn metrics(&self, queue: &QueueRecord) -> Result<QueueMetrics>;
    /// Bulk delete every row of a queue.
    async fn purge(&self, queue_id: i64) -> Result<u64>;
}

/// A connected backing store.
#[async_trait]
pub trait Store: Send + Sync {
    fn config(&self) -> &Config;

    fn backend_name(&self) -> &'static str;

    /// Quote an identifier so it is safe to splice into SQL text.
    fn quote_identifier(&self, name: &str) -> String {
        sql::quote_identifier(name)
    }

    fn queues(&self) -> &dyn QueueTable;

    fn elements(&self) -> &dyn ElementTable;

    /// Create both tables and their indexes if missing.
    async fn install(&self) -> Result<()>;

    /// Check both tables exist and every element references a known queue.
    async fn verify(&self) -> Result<()>;

    /// Drop both tables.
    async fn uninstall(&self) -> Result<()>;
}

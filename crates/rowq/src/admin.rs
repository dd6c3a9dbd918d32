//! Administrative operations: schema lifecycle and queue identities.
//!
//! The queue engine only ever resolves an existing queue by name. Creating the tables,
//! creating and deleting queues, and bulk-emptying them live here.

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{QueueMetrics, QueueRecord};

/// Admin handle over a store.
///
/// Provides:
/// - Schema management: install, verify, uninstall
/// - Queue management: create_queue, get_queue, list_queues, delete_queue, purge_queue
/// - Reporting: queue_metrics
pub struct Admin<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> Admin<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Get access to the underlying store
    pub fn store(&self) -> &S {
        self.store
    }

    /// Create both tables and their indexes. Safe to run repeatedly.
    pub async fn install(&self) -> Result<()> {
        self.store.install().await?;
        tracing::info!(backend = self.store.backend_name(), "Schema installed");
        Ok(())
    }

    pub async fn verify(&self) -> Result<()> {
        self.store.verify().await
    }

    /// Drop both tables with everything in them.
    pub async fn uninstall(&self) -> Result<()> {
        self.store.uninstall().await?;
        tracing::info!(backend = self.store.backend_name(), "Schema removed");
        Ok(())
    }

    pub async fn create_queue(&self, name: &str) -> Result<QueueRecord> {
        if name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                field: "name".to_string(),
                message: "Queue name must not be empty".to_string(),
            });
        }
        let queue = self.store.queues().insert(name).await?;
        tracing::info!(queue = %queue.name, queue_id = queue.queue_id, "Created queue");
        Ok(queue)
    }

    pub async fn get_queue(&self, name: &str) -> Result<QueueRecord> {
        self.store.queues().get_by_name(name).await
    }

    pub async fn list_queues(&self) -> Result<Vec<QueueRecord>> {
        self.store.queues().list().await
    }

    /// Delete a queue and all of its elements.
    pub async fn delete_queue(&self, name: &str) -> Result<()> {
        let queue = self.store.queues().get_by_name(name).await?;
        let purged = self.store.elements().purge(queue.queue_id).await?;
        if self.store.queues().delete_by_name(name).await? == 0 {
            return Err(Error::QueueNotFound {
                name: name.to_string(),
            });
        }
        tracing::info!(queue = %queue.name, purged, "Deleted queue");
        Ok(())
    }

    /// Remove every element of a queue, locked or not. Returns how many were removed.
    pub async fn purge_queue(&self, name: &str) -> Result<u64> {
        let queue = self.store.queues().get_by_name(name).await?;
        let purged = self.store.elements().purge(queue.queue_id).await?;
        tracing::info!(queue = %queue.name, purged, "Purged queue");
        Ok(purged)
    }

    pub async fn queue_metrics(&self, name: &str) -> Result<QueueMetrics> {
        let queue = self.store.queues().get_by_name(name).await?;
        self.store.elements().metrics(&queue).await
    }

    /// Metrics for every queue, in creation order.
    pub async fn all_queue_metrics(&self) -> Result<Vec<QueueMetrics>> {
        let mut metrics = Vec::new();
        for queue in self.store.queues().list().await? {
            metrics.push(self.store.elements().metrics(&queue).await?);
        }
        Ok(metrics)
    }
}

/// Entry point for administrative operations.
///
/// # Example
/// ```rust,no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = rowq::connect("sqlite:///tmp/jobs.db").await?;
/// rowq::admin(&store).install().await?;
/// rowq::admin(&store).create_queue("emails").await?;
/// # Ok(())
/// # }
/// ```
pub fn admin<S: Store>(store: &S) -> Admin<'_, S> {
    Admin::new(store)
}

//! Element handles.
//!
//! An [`Element`] is a retrieved row: its decoded payload, its id and a snapshot of its
//! requeue count, plus a borrow of the [`Queue`] it came from. Its state-changing methods
//! are single conditional statements against the shared table:
//!
//! - [`Element::lock`]: `Pending → Locked`, only if nobody else holds it.
//! - [`Element::requeue`]: `Locked → Pending`, bumping the stored requeue count.
//! - [`Element::success`] / [`Element::complete`]: remove the row.
//!
//! A statement that affects no row means another process got there first. That is reported
//! as `false` (or [`Completion::AlreadyGone`]), never as an error.

use crate::error::{Error, Result};
use crate::queue::{self, Queue};
use crate::types::ElementRecord;
use serde_json::Value;
use std::fmt;

/// How [`Element::complete`] removed (or failed to remove) its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The locked row was deleted.
    Removed,
    /// The row had been unlocked (requeued) by someone else and was deleted anyway.
    /// Another consumer may be processing the same payload right now.
    RemovedUnlocked,
    /// The row no longer existed.
    AlreadyGone,
}

impl Completion {
    /// True when this call deleted the row, locked or not.
    pub fn is_removed(&self) -> bool {
        !matches!(self, Completion::AlreadyGone)
    }
}

/// One retrieved element of a [`Queue`].
pub struct Element<'q> {
    queue: &'q Queue,
    id: i64,
    data: Value,
    requeue_count: i64,
}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("queue", &self.queue.name())
            .field("id", &self.id)
            .field("data", &self.data)
            .field("requeue_count", &self.requeue_count)
            .finish()
    }
}

impl<'q> Element<'q> {
    /// Decode a row with the queue's codec.
    pub(crate) fn from_record(queue: &'q Queue, record: ElementRecord) -> Result<Self> {
        let data = queue
            .codec()
            .decode(&record.payload)
            .map_err(|e| Error::Deserialization {
                element_id: record.element_id,
                message: e.to_string(),
            })?;

        Ok(Self {
            queue,
            id: record.element_id,
            data,
            requeue_count: record.requeue_count,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// Requeue count as of retrieval, plus any requeues made through this handle.
    pub fn requeue_count(&self) -> i64 {
        self.requeue_count
    }

    /// Claim the element. Returns `true` only for the one caller that took the lock.
    pub async fn lock(&self) -> Result<bool> {
        let affected = self
            .queue
            .store()
            .elements()
            .lock(self.id, queue::now())
            .await?;

        if affected == 1 {
            tracing::debug!(parent: self.queue.span(), element_id = self.id, "Locked element");
            Ok(true)
        } else {
            tracing::debug!(
                parent: self.queue.span(),
                element_id = self.id,
                "Element already locked or removed"
            );
            Ok(false)
        }
    }

    /// Release the lock and count one more requeue.
    ///
    /// Returns `false` without changing anything if the element is no longer locked or no
    /// longer exists.
    pub async fn requeue(&mut self) -> Result<bool> {
        let affected = self.queue.store().elements().requeue(self.id).await?;

        if affected == 1 {
            self.requeue_count += 1;
            tracing::debug!(
                parent: self.queue.span(),
                element_id = self.id,
                requeue_count = self.requeue_count,
                "Requeued element"
            );
            Ok(true)
        } else {
            tracing::debug!(
                parent: self.queue.span(),
                element_id = self.id,
                "Element not locked, requeue skipped"
            );
            Ok(false)
        }
    }

    /// Remove the element, reporting which branch of the removal applied.
    ///
    /// The locked row is deleted first. If that finds nothing, the row is deleted whatever
    /// its lock state, because the work has been done even if someone requeued it.
    pub async fn complete(self) -> Result<Completion> {
        let elements = self.queue.store().elements();

        if elements.delete_locked(self.id).await? == 1 {
            tracing::debug!(parent: self.queue.span(), element_id = self.id, "Removed element");
            return Ok(Completion::Removed);
        }

        if elements.delete(self.id).await? == 1 {
            tracing::warn!(
                parent: self.queue.span(),
                element_id = self.id,
                "Removed an unlocked element; it may be processed in parallel elsewhere"
            );
            return Ok(Completion::RemovedUnlocked);
        }

        tracing::info!(
            parent: self.queue.span(),
            element_id = self.id,
            "Element was already removed by another process"
        );
        Ok(Completion::AlreadyGone)
    }

    /// Remove the element. `true` if this call deleted the row.
    pub async fn success(self) -> Result<bool> {
        Ok(self.complete().await?.is_removed())
    }
}

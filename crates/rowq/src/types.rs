//! Core types for rowq: queue identities, element rows and metrics.
//!
//! ## What
//!
//! - [`QueueRecord`] is a resolved queue identity.
//! - [`ElementRecord`] is one persisted row of the element table, payload still encoded.
//! - [`NewElement`] is the insert shape used by `enqueue`.
//! - [`QueueMetrics`] summarizes a queue for administrative output.
//!
//! Timestamps are integer epoch seconds, exactly as stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// A queue identity row. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct QueueRecord {
    /// Store-assigned queue id
    pub queue_id: i64,
    /// Unique queue name
    pub name: String,
}

impl fmt::Display for QueueRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Queue {{ queue_id: {}, name: {} }}", self.queue_id, self.name)
    }
}

/// A persisted element row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct ElementRecord {
    /// Store-assigned id, strictly increasing in insertion order
    pub element_id: i64,
    /// Owning queue
    pub queue_id: i64,
    /// Encoded payload
    pub payload: String,
    /// Epoch seconds of the current lock, `None` while the element is eligible
    #[tabled(display_with = "display_option_i64")]
    pub lock_time: Option<i64>,
    /// Number of successful requeues
    pub requeue_count: i64,
    /// Epoch seconds of insertion
    pub created: i64,
}

impl ElementRecord {
    pub fn is_locked(&self) -> bool {
        self.lock_time.is_some()
    }
}

impl fmt::Display for ElementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Element {{ element_id: {}, queue_id: {}, lock_time: {}, requeue_count: {}, created: {} }}",
            self.element_id,
            self.queue_id,
            display_option_i64(&self.lock_time),
            self.requeue_count,
            self.created
        )
    }
}

/// Insert shape for a new element. `lock_time` and `requeue_count` start at NULL and 0.
#[derive(Debug, Clone)]
pub struct NewElement {
    pub queue_id: i64,
    pub payload: String,
    pub created: i64,
}

/// Per-queue counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct QueueMetrics {
    /// Name of the queue
    pub name: String,
    /// All rows currently belonging to the queue
    pub total_elements: i64,
    /// Rows with no lock
    pub pending_elements: i64,
    /// Rows currently locked
    pub locked_elements: i64,
    /// Highest requeue count among the queue's rows
    pub max_requeue_count: i64,
}

fn display_option_i64(value: &Option<i64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NULL".to_string(),
    }
}

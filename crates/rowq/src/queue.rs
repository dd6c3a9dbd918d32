//! The queue engine.
//!
//! ## What
//!
//! - [`Queue`] is one consumer's (or producer's) view of a named queue: it enqueues payloads,
//!   hands out [`Element`]s in ascending id order, and requeues abandoned locks.
//! - [`QueueBuilder`] resolves the queue identity and applies per-queue settings.
//! - [`ScanPosition`] is the in-memory scan cursor.
//!
//! ## How
//!
//! A `Queue` never revisits an id it has already returned. On the first retrieval it snapshots
//! the highest element id of the queue (the high-water mark) and then walks
//! `(last_seen_id, high_water_mark]` upwards. `last_seen_id` only ever grows; an `enqueue`
//! through the same instance drops the snapshot so newer rows are picked up, but never rewinds
//! the cursor. Coordination with other consumers happens entirely in the store, through the
//! conditional writes issued by [`Element`].
//!
//! ### Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use serde_json::json;
//!
//! let store = rowq::connect("sqlite:///tmp/jobs.db").await?;
//! rowq::admin(&store).install().await?;
//! rowq::admin(&store).create_queue("emails").await?;
//!
//! let queue = rowq::queue("emails").max_requeue_count(5).open(&store).await?;
//! queue.enqueue(&json!({"to": "ops@example.com"})).await?;
//!
//! if let Some(element) = queue.next().await? {
//!     if element.lock().await? {
//!         // ... process element.data() ...
//!         element.success().await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::codec::{Codec, JsonCodec};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::store::{ScanWindow, Store};
use crate::types::{NewElement, QueueRecord};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Span;

/// Snapshot of a queue's scan cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanPosition {
    /// Highest element id that existed when the current scan began
    pub high_water_mark: Option<i64>,
    /// Highest element id returned so far; never decreases
    pub last_seen_id: i64,
}

impl ScanPosition {
    fn exhausted(&self) -> bool {
        matches!(self.high_water_mark, Some(hwm) if self.last_seen_id >= hwm)
    }

    fn advance(&mut self, element_id: i64) {
        self.last_seen_id = self.last_seen_id.max(element_id);
    }

    fn invalidate(&mut self) {
        self.high_water_mark = None;
    }
}

/// Builder for opening a [`Queue`].
///
/// Settings left unset fall back to the store's [`crate::Config`].
pub struct QueueBuilder {
    name: String,
    max_requeue_count: Option<Option<u32>>,
    cleanup_timeout: Option<Option<u64>>,
    codec: Option<Box<dyn Codec>>,
    span: Option<Span>,
}

impl QueueBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_requeue_count: None,
            cleanup_timeout: None,
            codec: None,
            span: None,
        }
    }

    /// Skip elements requeued more than `limit` times.
    pub fn max_requeue_count(mut self, limit: u32) -> Self {
        self.max_requeue_count = Some(Some(limit));
        self
    }

    /// Hand out elements however often they were requeued, whatever the config says.
    pub fn unlimited_requeues(mut self) -> Self {
        self.max_requeue_count = Some(None);
        self
    }

    /// Requeue locks older than `seconds` as soon as the queue is opened.
    pub fn cleanup_timeout(mut self, seconds: u64) -> Self {
        self.cleanup_timeout = Some(Some(seconds));
        self
    }

    /// Open without the configured cleanup pass.
    pub fn skip_cleanup(mut self) -> Self {
        self.cleanup_timeout = Some(None);
        self
    }

    pub fn codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }

    /// Emit every event of this queue under `span` instead of the default
    /// `rowq.queue{queue, queue_id}` span.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Resolve the queue identity and open the queue.
    pub async fn open<S: Store + Clone + 'static>(self, store: &S) -> Result<Queue> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                field: "name".to_string(),
                message: "Queue name must not be empty".to_string(),
            });
        }

        let config = store.config();
        let max_requeue_count = self
            .max_requeue_count
            .unwrap_or(config.max_requeue_count)
            .map(i64::from);
        let cleanup_timeout = self.cleanup_timeout.unwrap_or(config.cleanup_timeout_seconds);
        let max_payload_bytes = config.max_payload_bytes;

        let info = store.queues().get_by_name(&self.name).await?;
        let span = self.span.unwrap_or_else(|| {
            tracing::info_span!("rowq.queue", queue = %info.name, queue_id = info.queue_id)
        });

        let queue = Queue {
            store: Arc::new(store.clone()),
            info,
            codec: self.codec.unwrap_or_else(|| Box::new(JsonCodec)),
            cursor: Mutex::new(ScanPosition::default()),
            max_requeue_count,
            max_payload_bytes,
            span,
        };
        tracing::debug!(
            parent: &queue.span,
            max_requeue_count = ?queue.max_requeue_count,
            "Opened queue"
        );

        if let Some(timeout) = cleanup_timeout {
            let requeued = queue.cleanup(timeout).await?.len();
            tracing::debug!(parent: &queue.span, requeued, timeout, "Cleanup on open");
        }

        Ok(queue)
    }
}

/// Start building a [`Queue`] handle for `name`.
///
/// # Example
/// ```rust,no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = rowq::connect("sqlite:///tmp/jobs.db").await?;
/// let queue = rowq::queue("emails").cleanup_timeout(3600).open(&store).await?;
/// # Ok(())
/// # }
/// ```
pub fn queue(name: impl Into<String>) -> QueueBuilder {
    QueueBuilder::new(name)
}

/// A named queue bound to a store.
pub struct Queue {
    store: Arc<dyn Store>,
    info: QueueRecord,
    codec: Box<dyn Codec>,
    cursor: Mutex<ScanPosition>,
    max_requeue_count: Option<i64>,
    max_payload_bytes: usize,
    span: Span,
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("info", &self.info)
            .field("backend", &self.store.backend_name())
            .field("cursor", &self.scan_position())
            .field("max_requeue_count", &self.max_requeue_count)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .finish_non_exhaustive()
    }
}

impl Queue {
    pub fn info(&self) -> &QueueRecord {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn id(&self) -> i64 {
        self.info.queue_id
    }

    /// Requeue limit applied to retrieval; `None` is unlimited.
    pub fn max_requeue_count(&self) -> Option<i64> {
        self.max_requeue_count
    }

    pub fn scan_position(&self) -> ScanPosition {
        *self.cursor_guard()
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    // Never held across an await. A poisoned cursor is still a valid position.
    fn cursor_guard(&self) -> MutexGuard<'_, ScanPosition> {
        self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn encode(&self, data: &Value) -> Result<String> {
        let payload = self.codec.encode(data)?;
        if payload.len() > self.max_payload_bytes {
            return Err(Error::PayloadTooLarge {
                actual_bytes: payload.len(),
                max_bytes: self.max_payload_bytes,
            });
        }
        Ok(payload)
    }

    /// Insert one element and return its id.
    ///
    /// Fails with [`Error::PayloadTooLarge`] before touching the store if the encoded payload
    /// exceeds the configured ceiling.
    pub async fn enqueue(&self, data: &Value) -> Result<i64> {
        let payload = self.encode(data)?;
        let element_id = self
            .store
            .elements()
            .insert(NewElement {
                queue_id: self.info.queue_id,
                payload,
                created: now(),
            })
            .await?;

        self.cursor_guard().invalidate();
        tracing::debug!(parent: &self.span, element_id, "Enqueued element");
        Ok(element_id)
    }

    /// Insert several elements in order. Every payload is encoded and size-checked first,
    /// so an oversized entry means nothing is written.
    pub async fn enqueue_batch(&self, data: &[Value]) -> Result<Vec<i64>> {
        let payloads = data
            .iter()
            .map(|value| self.encode(value))
            .collect::<Result<Vec<_>>>()?;

        let created = now();
        let mut ids = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let element_id = self
                .store
                .elements()
                .insert(NewElement {
                    queue_id: self.info.queue_id,
                    payload,
                    created,
                })
                .await?;
            ids.push(element_id);
        }

        if !ids.is_empty() {
            self.cursor_guard().invalidate();
        }
        tracing::debug!(parent: &self.span, count = ids.len(), "Enqueued batch");
        Ok(ids)
    }

    /// Return up to `max_count` unlocked elements past the scan cursor, ascending by id.
    ///
    /// With `ids`, only those element ids are considered. Returned ids are never handed out
    /// again by this instance, whatever happens to them later.
    pub async fn retrieve_batch(
        &self,
        max_count: usize,
        ids: Option<&[i64]>,
    ) -> Result<Vec<Element<'_>>> {
        if max_count == 0 {
            return Ok(vec![]);
        }

        let mut position = self.scan_position();
        let high_water_mark = match position.high_water_mark {
            Some(hwm) => hwm,
            None => match self.store.elements().max_id(self.info.queue_id).await? {
                Some(hwm) => {
                    self.cursor_guard().high_water_mark = Some(hwm);
                    position.high_water_mark = Some(hwm);
                    tracing::trace!(parent: &self.span, high_water_mark = hwm, "New scan snapshot");
                    hwm
                }
                None => return Ok(vec![]),
            },
        };

        if position.exhausted() {
            return Ok(vec![]);
        }

        let window = ScanWindow {
            queue_id: self.info.queue_id,
            after_id: position.last_seen_id,
            up_to: high_water_mark,
            max_requeue_count: self.max_requeue_count,
            ids: ids.map(<[i64]>::to_vec),
            limit: i64::try_from(max_count).unwrap_or(i64::MAX),
        };
        let rows = self.store.elements().fetch_window(&window).await?;
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let elements = rows
            .into_iter()
            .map(|row| Element::from_record(self, row))
            .collect::<Result<Vec<_>>>()?;

        if let Some(last) = elements.last() {
            self.cursor_guard().advance(last.id());
        }
        tracing::debug!(
            parent: &self.span,
            count = elements.len(),
            last_seen_id = self.scan_position().last_seen_id,
            "Retrieved elements"
        );
        Ok(elements)
    }

    /// The next unlocked element past the cursor, if any.
    pub async fn next(&self) -> Result<Option<Element<'_>>> {
        Ok(self.retrieve_batch(1, None).await?.into_iter().next())
    }

    /// Look an element up by id regardless of its lock state or the scan cursor.
    ///
    /// Returns `None` when the id does not exist or belongs to another queue.
    pub async fn get_element_by_id(&self, element_id: i64) -> Result<Option<Element<'_>>> {
        self.store
            .elements()
            .get(self.info.queue_id, element_id)
            .await?
            .map(|row| Element::from_record(self, row))
            .transpose()
    }

    /// Requeue every element of this queue locked for longer than `timeout_seconds`.
    ///
    /// Returns the handles that this call actually requeued; rows another process touched in
    /// the meantime are skipped.
    pub async fn cleanup(&self, timeout_seconds: u64) -> Result<Vec<Element<'_>>> {
        let timeout = i64::try_from(timeout_seconds).map_err(|_| Error::InvalidConfig {
            field: "cleanup_timeout".to_string(),
            message: format!("{} seconds is out of range", timeout_seconds),
        })?;
        let threshold = now().saturating_sub(timeout);

        let rows = self
            .store
            .elements()
            .locked_before(self.info.queue_id, threshold)
            .await?;

        let mut requeued = Vec::with_capacity(rows.len());
        for row in rows {
            let mut element = Element::from_record(self, row)?;
            if element.requeue().await? {
                requeued.push(element);
            }
        }

        if !requeued.is_empty() {
            tracing::info!(
                parent: &self.span,
                count = requeued.len(),
                timeout_seconds,
                "Requeued abandoned elements"
            );
        }
        Ok(requeued)
    }

    /// Number of rows in this queue, locked or not.
    pub async fn count(&self) -> Result<i64> {
        self.store.elements().count(self.info.queue_id).await
    }
}

/// Current time as epoch seconds, the unit stored in `lock_time` and `created`.
pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

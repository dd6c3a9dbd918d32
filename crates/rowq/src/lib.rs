//! # rowq
//!
//! **rowq** is a work queue kept in two ordinary relational tables and shared by any number of
//! independent processes, without database transactions.
//!
//! ## Features
//!
//! - **Transaction-free coordination**: every claim, release and removal is a single conditional
//!   `UPDATE`/`DELETE` on one row; losing a race is a `false`, never an error.
//! - **No backtracking**: each [`Queue`] walks element ids upwards from a private cursor and never
//!   hands out an id twice.
//! - **Requeue limits and orphan cleanup**: elements requeued too often stop being served;
//!   locks held past a timeout are released.
//! - **Pluggable payload codecs**: JSON by default, base64-wrapped or custom function pairs.
//! - **SQLite and PostgreSQL** backends, selected from the DSN.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = rowq::connect("sqlite:///tmp/jobs.db").await?;
//!
//! // Setup (run once)
//! rowq::admin(&store).install().await?;
//! rowq::admin(&store).create_queue("thumbnails").await?;
//!
//! // Producer
//! let queue = rowq::queue("thumbnails").open(&store).await?;
//! queue.enqueue(&json!({"image": "cat.png", "size": 128})).await?;
//!
//! // Consumer
//! let consumer = rowq::queue("thumbnails").max_requeue_count(3).open(&store).await?;
//! while let Some(mut element) = consumer.next().await? {
//!     if !element.lock().await? {
//!         continue;
//!     }
//!     match render(element.data()) {
//!         Ok(()) => {
//!             element.success().await?;
//!         }
//!         Err(_) => {
//!             element.requeue().await?;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! # fn render(_: &serde_json::Value) -> Result<(), ()> { Ok(()) }
//! ```

pub mod admin;
pub mod codec;
pub mod config;
pub mod element;
pub mod error;
pub mod queue;
pub mod store;
pub mod types;

pub use crate::admin::{admin, Admin};
pub use crate::codec::{Base64Codec, Codec, FnCodec, JsonCodec};
pub use crate::config::Config;
pub use crate::element::{Completion, Element};
pub use crate::error::{Error, Result};
pub use crate::queue::{queue, Queue, QueueBuilder, ScanPosition};
pub use crate::store::{AnyStore, ElementTable, QueueTable, Store};
pub use crate::types::{ElementRecord, NewElement, QueueMetrics, QueueRecord};

/// Connect to a backing store using a DSN string and default settings.
///
/// For custom table names, pool sizing or queue defaults use
/// [`connect_with_config`].
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = rowq::connect("sqlite:///var/lib/jobs.db").await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(dsn: &str) -> Result<AnyStore> {
    AnyStore::connect_with_dsn(dsn).await
}

/// Connect to a backing store using a configuration object.
///
/// # Example
/// ```no_run
/// # use rowq::Config;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::from_dsn("sqlite:///var/lib/jobs.db")
///     .with_tables("work_queues", "work_items")?
///     .with_max_requeue_count(Some(5));
/// let store = rowq::connect_with_config(&config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect_with_config(config: &Config) -> Result<AnyStore> {
    AnyStore::connect(config).await
}

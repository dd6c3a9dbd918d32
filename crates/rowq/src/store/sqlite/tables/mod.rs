pub mod elements;
pub mod queues;

pub use elements::SqliteElementTable;
pub use queues::SqliteQueueTable;

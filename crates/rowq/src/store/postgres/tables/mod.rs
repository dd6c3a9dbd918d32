pub mod elements;
pub mod queues;

pub use elements::PostgresElementTable;
pub use queues::PostgresQueueTable;

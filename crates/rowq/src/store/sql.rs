//! SQL text shared by the backends.
//!
//! Table names are configurable per deployment, so statements are rendered once per store
//! from the configured names (always quoted) instead of living in `const` strings.
//! Placeholders use the `$n` form, which both SQLite and PostgreSQL accept, and timestamps
//! are bound epoch integers, so one rendering serves every backend.

use crate::config::Config;

/// Columns of the element table in the order `map_row` expects them.
pub const ELEMENT_COLUMNS: &str = "element_id, queue_id, payload, lock_time, requeue_count, created";

/// Quote an identifier with double quotes, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Rendered statements for one pair of tables.
#[derive(Debug, Clone)]
pub struct Statements {
    pub queues_table: String,
    pub elements_table: String,
    pub queues_table_raw: String,
    pub elements_table_raw: String,

    pub insert_queue: String,
    pub get_queue_by_name: String,
    pub count_queue_by_name: String,
    pub list_queues: String,
    pub delete_queue_by_name: String,

    pub insert_element: String,
    pub max_element_id: String,
    pub select_window_prefix: String,
    pub get_element: String,
    pub lock_element: String,
    pub requeue_element: String,
    pub delete_locked_element: String,
    pub delete_element: String,
    pub select_locked_before: String,
    pub count_elements: String,
    pub element_metrics: String,
    pub purge_elements: String,

    pub count_orphaned_elements: String,
    pub create_queue_scan_index: String,
    pub create_lock_time_index: String,
    pub drop_elements: String,
    pub drop_queues: String,
}

impl Statements {
    pub fn new(config: &Config) -> Self {
        let q = quote_identifier(&config.queues_table);
        let e = quote_identifier(&config.elements_table);
        let scan_idx = quote_identifier(&format!("{}_queue_scan_idx", config.elements_table));
        let lock_idx = quote_identifier(&format!("{}_lock_time_idx", config.elements_table));

        Self {
            insert_queue: format!(
                "INSERT INTO {q} (name) VALUES ($1) RETURNING queue_id, name"
            ),
            get_queue_by_name: format!("SELECT queue_id, name FROM {q} WHERE name = $1"),
            count_queue_by_name: format!("SELECT COUNT(*) FROM {q} WHERE name = $1"),
            list_queues: format!("SELECT queue_id, name FROM {q} ORDER BY queue_id"),
            delete_queue_by_name: format!("DELETE FROM {q} WHERE name = $1"),

            insert_element: format!(
                "INSERT INTO {e} (queue_id, payload, lock_time, requeue_count, created) \
                 VALUES ($1, $2, NULL, 0, $3) RETURNING element_id"
            ),
            max_element_id: format!("SELECT MAX(element_id) FROM {e} WHERE queue_id = $1"),
            select_window_prefix: format!("SELECT {ELEMENT_COLUMNS} FROM {e} WHERE queue_id = "),
            get_element: format!(
                "SELECT {ELEMENT_COLUMNS} FROM {e} WHERE element_id = $1 AND queue_id = $2"
            ),
            lock_element: format!(
                "UPDATE {e} SET lock_time = $1 WHERE element_id = $2 AND lock_time IS NULL"
            ),
            requeue_element: format!(
                "UPDATE {e} SET lock_time = NULL, requeue_count = requeue_count + 1 \
                 WHERE element_id = $1 AND lock_time IS NOT NULL"
            ),
            delete_locked_element: format!(
                "DELETE FROM {e} WHERE element_id = $1 AND lock_time IS NOT NULL"
            ),
            delete_element: format!("DELETE FROM {e} WHERE element_id = $1"),
            select_locked_before: format!(
                "SELECT {ELEMENT_COLUMNS} FROM {e} \
                 WHERE queue_id = $1 AND lock_time < $2 ORDER BY element_id"
            ),
            count_elements: format!("SELECT COUNT(*) FROM {e} WHERE queue_id = $1"),
            element_metrics: format!(
                "SELECT COUNT(*) AS total_elements, \
                 COALESCE(SUM(CASE WHEN lock_time IS NULL THEN 1 ELSE 0 END), 0) AS pending_elements, \
                 COALESCE(SUM(CASE WHEN lock_time IS NOT NULL THEN 1 ELSE 0 END), 0) AS locked_elements, \
                 COALESCE(MAX(requeue_count), 0) AS max_requeue_count \
                 FROM {e} WHERE queue_id = $1"
            ),
            purge_elements: format!("DELETE FROM {e} WHERE queue_id = $1"),

            count_orphaned_elements: format!(
                "SELECT COUNT(*) FROM {e} el LEFT OUTER JOIN {q} qu ON el.queue_id = qu.queue_id \
                 WHERE qu.queue_id IS NULL"
            ),
            create_queue_scan_index: format!(
                "CREATE INDEX IF NOT EXISTS {scan_idx} ON {e} (queue_id, element_id)"
            ),
            create_lock_time_index: format!(
                "CREATE INDEX IF NOT EXISTS {lock_idx} ON {e} (lock_time)"
            ),
            drop_elements: format!("DROP TABLE IF EXISTS {e}"),
            drop_queues: format!("DROP TABLE IF EXISTS {q}"),

            queues_table: q,
            elements_table: e,
            queues_table_raw: config.queues_table.clone(),
            elements_table_raw: config.elements_table.clone(),
        }
    }
}

use rowq::store::Store;
use rowq::{Config, Error, QueueMetrics};
use serde_json::json;

mod common;

use common::TestDb;

#[tokio::test]
async fn test_install_verify_uninstall() {
    let db = TestDb::new().await;
    let admin = rowq::admin(&db.store);

    admin.install().await.expect("install is idempotent");
    admin.verify().await.expect("verify after install");
    assert_eq!(admin.store().backend_name(), "sqlite");

    admin.uninstall().await.unwrap();
    assert!(matches!(
        admin.verify().await,
        Err(Error::SchemaValidation { .. })
    ));
}

#[tokio::test]
async fn test_queue_lifecycle() {
    let db = TestDb::new().await;
    let admin = rowq::admin(&db.store);

    let created = admin.create_queue("invoices").await.unwrap();
    assert_eq!(created.name, "invoices");
    assert_eq!(admin.get_queue("invoices").await.unwrap(), created);

    assert!(matches!(
        admin.create_queue("invoices").await,
        Err(Error::QueueAlreadyExists { .. })
    ));

    admin.create_queue("receipts").await.unwrap();
    let names: Vec<String> = admin
        .list_queues()
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.name)
        .collect();
    assert_eq!(names, vec!["invoices", "receipts"]);

    let queue = rowq::queue("invoices").open(&db.store).await.unwrap();
    queue.enqueue_batch(&[json!(1), json!(2)]).await.unwrap();

    admin.delete_queue("invoices").await.unwrap();
    assert!(matches!(
        admin.get_queue("invoices").await,
        Err(Error::QueueNotFound { .. })
    ));
    assert!(matches!(
        admin.delete_queue("invoices").await,
        Err(Error::QueueNotFound { .. })
    ));
    admin.verify().await.expect("no orphaned elements after delete");
    assert_eq!(db.store.elements().count(created.queue_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_purge_and_metrics() {
    let db = TestDb::new().await;
    let admin = rowq::admin(&db.store);
    admin.create_queue("reports").await.unwrap();
    admin.create_queue("idle").await.unwrap();

    let queue = rowq::queue("reports").open(&db.store).await.unwrap();
    queue
        .enqueue_batch(&[json!("a"), json!("b"), json!("c")])
        .await
        .unwrap();
    let mut first = queue.next().await.unwrap().unwrap();
    assert!(first.lock().await.unwrap());
    assert!(first.requeue().await.unwrap());
    let second = queue.next().await.unwrap().unwrap();
    assert!(second.lock().await.unwrap());

    let metrics = admin.queue_metrics("reports").await.unwrap();
    assert_eq!(
        metrics,
        QueueMetrics {
            name: "reports".to_string(),
            total_elements: 3,
            pending_elements: 2,
            locked_elements: 1,
            max_requeue_count: 1,
        }
    );

    let all = admin.all_queue_metrics().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].total_elements, 0);

    assert_eq!(admin.purge_queue("reports").await.unwrap(), 3);
    assert_eq!(queue.count().await.unwrap(), 0);
    assert_eq!(admin.purge_queue("reports").await.unwrap(), 0);
}

#[tokio::test]
async fn test_custom_table_names() {
    let db = TestDb::with_config(|c| {
        c.with_tables("work_queues", "work_items")
            .expect("valid table names")
    })
    .await;
    let name = db.create_queue("custom").await;

    let queue = rowq::queue(&name).open(&db.store).await.unwrap();
    let id = queue.enqueue(&json!("in custom tables")).await.unwrap();
    assert_eq!(queue.next().await.unwrap().unwrap().id(), id);

    // the default tables were never created
    let default_store = rowq::connect_with_config(&Config::from_dsn(db.config.dsn.clone()))
        .await
        .unwrap();
    assert!(matches!(
        rowq::admin(&default_store).verify().await,
        Err(Error::SchemaValidation { .. })
    ));
}

#[tokio::test]
async fn test_create_queue_rejects_empty_name() {
    let db = TestDb::new().await;
    let err = rowq::admin(&db.store).create_queue("").await.unwrap_err();
    assert!(err.is_configuration());
}

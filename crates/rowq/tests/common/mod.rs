use rowq::config::Config;
use rowq::store::AnyStore;
use tempfile::TempDir;

/// A throw-away SQLite database file with the schema installed.
///
/// Every call to [`TestDb::connect`] opens an independent pool on the same file, which is as
/// close to "another process" as a single test binary gets.
pub struct TestDb {
    // Deleted on drop, so it must outlive every store.
    _dir: TempDir,
    pub config: Config,
    pub store: AnyStore,
}

#[allow(dead_code)]
impl TestDb {
    pub async fn new() -> Self {
        Self::with_config(|config| config).await
    }

    /// Create the database with a tweaked configuration.
    pub async fn with_config(tweak: impl FnOnce(Config) -> Config) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("rowq.db");
        let config = tweak(Config::from_dsn(format!("sqlite://{}", path.display())));

        let store = rowq::connect_with_config(&config)
            .await
            .unwrap_or_else(|e| panic!("Failed to open {}: {:?}", config.dsn, e));
        rowq::admin(&store)
            .install()
            .await
            .expect("Failed to install schema");

        Self {
            _dir: dir,
            config,
            store,
        }
    }

    /// A second, independent connection pool on the same database.
    pub async fn connect(&self) -> AnyStore {
        rowq::connect_with_config(&self.config)
            .await
            .expect("Failed to open second store")
    }

    /// Create a queue and return its name.
    pub async fn create_queue(&self, name: &str) -> String {
        rowq::admin(&self.store)
            .create_queue(name)
            .await
            .expect("Failed to create queue");
        name.to_string()
    }
}

/// Epoch seconds, matching what the engine stores.
#[allow(dead_code)]
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

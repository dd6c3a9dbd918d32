//! AnyStore enum for runtime backend selection.
//!
//! `AnyStore` wraps the compiled-in backends and forwards the `Store` trait to whichever
//! one the DSN selected.

use super::*;
use crate::config::Config;
#[cfg(feature = "postgres")]
use crate::store::postgres::PostgresStore;
#[cfg(feature = "sqlite")]
use crate::store::sqlite::SqliteStore;

/// Runtime-selectable database backend.
#[derive(Clone, Debug)]
pub enum AnyStore {
    /// PostgreSQL backend
    #[cfg(feature = "postgres")]
    Postgres(PostgresStore),
    /// SQLite backend
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStore),
}

impl AnyStore {
    /// Connect using a full configuration object.
    ///
    /// The configuration is validated first, so a bad table name or pool size never
    /// reaches the database.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let backend = BackendType::detect(&config.dsn)?;
        tracing::debug!(backend = ?backend, "Connecting store");

        match backend {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => Ok(AnyStore::Postgres(PostgresStore::new(config).await?)),
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => Ok(AnyStore::Sqlite(SqliteStore::new(config).await?)),
        }
    }

    /// Connect using just a DSN string and default settings.
    ///
    /// The DSN scheme determines the backend:
    /// - `postgres://` or `postgresql://` → PostgreSQL (requires "postgres" feature)
    /// - `sqlite:` → SQLite
    ///
    /// # Example
    /// ```no_run
    /// # use rowq::store::AnyStore;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = AnyStore::connect_with_dsn("sqlite:///tmp/jobs.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect_with_dsn(dsn: &str) -> Result<Self> {
        Self::connect(&Config::from_dsn(dsn)).await
    }
}

#[async_trait]
impl Store for AnyStore {
    fn config(&self) -> &Config {
        match self {
            #[cfg(feature = "postgres")]
            AnyStore::Postgres(s) => s.config(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.config(),
        }
    }

    fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "postgres")]
            AnyStore::Postgres(s) => s.backend_name(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.backend_name(),
        }
    }

    fn queues(&self) -> &dyn QueueTable {
        match self {
            #[cfg(feature = "postgres")]
            AnyStore::Postgres(s) => s.queues(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.queues(),
        }
    }

    fn elements(&self) -> &dyn ElementTable {
        match self {
            #[cfg(feature = "postgres")]
            AnyStore::Postgres(s) => s.elements(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.elements(),
        }
    }

    async fn install(&self) -> Result<()> {
        match self {
            #[cfg(feature = "postgres")]
            AnyStore::Postgres(s) => s.install().await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.install().await,
        }
    }

    async fn verify(&self) -> Result<()> {
        match self {
            #[cfg(feature = "postgres")]
            AnyStore::Postgres(s) => s.verify().await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.verify().await,
        }
    }

    async fn uninstall(&self) -> Result<()> {
        match self {
            #[cfg(feature = "postgres")]
            AnyStore::Postgres(s) => s.uninstall().await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.uninstall().await,
        }
    }
}

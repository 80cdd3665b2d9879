/// Application context and dependency injection
use crate::{
    config::{ServerConfig, StoreBackend},
    db,
    error::KeyringResult,
    journal::{Journal, LocalJournal},
    manager::ServerCryptoManager,
    rate_limit::RateLimiter,
    store::{KeyStore, MemoryKeyStore, SqliteKeyStore},
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub key_store: Arc<dyn KeyStore>,
    pub journal: Arc<dyn Journal>,
    pub crypto_manager: Arc<ServerCryptoManager>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Cancelled once on shutdown; every background task watches it
    pub shutdown: CancellationToken,
    /// Background tasks (negative cache sweep, journal watchers)
    pub tasks: TaskTracker,
    pub started_at: Instant,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> KeyringResult<Self> {
        // Validate configuration
        config.validate()?;

        let key_store = Self::open_key_store(&config).await?;
        let journal: Arc<dyn Journal> = Arc::new(LocalJournal::new());

        Self::with_services(config, key_store, journal)
    }

    /// Assemble a context around an already opened store and journal
    pub fn with_services(
        config: ServerConfig,
        key_store: Arc<dyn KeyStore>,
        journal: Arc<dyn Journal>,
    ) -> KeyringResult<Self> {
        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();

        let crypto_manager = Arc::new(ServerCryptoManager::new(
            &config,
            key_store.clone(),
            journal.clone(),
            &tasks,
            &shutdown,
        )?);

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            key_store,
            journal,
            crypto_manager,
            rate_limiter,
            shutdown,
            tasks,
            started_at: Instant::now(),
        })
    }

    async fn open_key_store(config: &ServerConfig) -> KeyringResult<Arc<dyn KeyStore>> {
        match config.storage.backend {
            StoreBackend::Memory => {
                info!("Using in-memory key store; enrollments will not survive a restart");
                Ok(Arc::new(MemoryKeyStore::new()))
            }
            StoreBackend::Sqlite => {
                tokio::fs::create_dir_all(&config.storage.data_directory).await?;

                let pool =
                    db::create_pool(&config.storage.key_db, db::DatabaseOptions::default()).await?;
                db::run_migrations(&pool).await?;
                db::test_connection(&pool).await?;

                info!("Key store at {}", config.storage.key_db.display());
                Ok(Arc::new(SqliteKeyStore::new(pool)))
            }
        }
    }

    /// Cancel background work and wait for it to finish
    pub async fn shutdown(&self) {
        self.crypto_manager.stop();
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrontendConfig;
    use crate::testutil::{SERVER_CERTIFICATE, SERVER_NAME, SERVER_PRIVATE_KEY};

    fn config_with(backend: StoreBackend, dir: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig {
            frontend: Some(FrontendConfig {
                certificate: SERVER_CERTIFICATE.to_string(),
                private_key: SERVER_PRIVATE_KEY.to_string(),
            }),
            ..ServerConfig::default()
        };
        config.storage.backend = backend;
        config.storage.data_directory = dir.to_path_buf();
        config.storage.key_db = dir.join("keys.sqlite");
        config
    }

    #[tokio::test]
    async fn test_sqlite_context() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(config_with(StoreBackend::Sqlite, dir.path()))
            .await
            .unwrap();

        assert_eq!(ctx.crypto_manager.server_name(), SERVER_NAME);
        assert!(dir.path().join("keys.sqlite").exists());

        ctx.shutdown().await;
        assert!(ctx.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_memory_context_needs_no_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");
        let ctx = AppContext::new(config_with(StoreBackend::Memory, &missing))
            .await
            .unwrap();

        assert!(!missing.exists());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_frontend_is_rejected() {
        let mut config = ServerConfig::default();
        config.storage.backend = StoreBackend::Memory;
        assert!(AppContext::new(config).await.is_err());
    }
}

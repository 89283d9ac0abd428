use std::sync::Arc;

use intranet_core::config::{AppConfig, ConfigError, LoadOptions};
use intranet_db::{connect_with_settings, migrations, DbPool, FsAttachmentStore, LifecycleOrchestrator};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<LifecycleOrchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("attachment storage is unusable: {0}")]
    Storage(#[source] std::io::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    tokio::fs::create_dir_all(&config.storage.root).await.map_err(BootstrapError::Storage)?;
    let store = Arc::new(FsAttachmentStore::new(config.storage.root.clone()));
    info!(
        event_name = "system.bootstrap.storage_ready",
        root = %config.storage.root.display(),
        "attachment storage ready"
    );

    let orchestrator = Arc::new(LifecycleOrchestrator::new(db_pool.clone(), store));

    Ok(Application { config, db_pool, orchestrator })
}

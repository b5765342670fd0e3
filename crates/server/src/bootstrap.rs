use std::sync::Arc;

use pairadox_core::config::{AppConfig, ConfigError, LoadOptions};
use pairadox_core::substitution::SubstitutionEngine;
use pairadox_db::repositories::{CatalogRepository, RepositoryError, SqlCatalogRepository};
use pairadox_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<SubstitutionEngine>,
    pub catalog_repository: Arc<dyn CatalogRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog restore failed: {0}")]
    CatalogRestore(#[source] RepositoryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let engine = Arc::new(SubstitutionEngine::new());
    let catalog_repository: Arc<dyn CatalogRepository> =
        Arc::new(SqlCatalogRepository::new(db_pool.clone()));

    if config.catalog.restore_on_startup {
        restore_catalog(&engine, catalog_repository.as_ref()).await?;
    }

    Ok(Application { config, db_pool, engine, catalog_repository })
}

/// Rebuilds the engine catalog from the last stored upload. A stored catalog that no longer
/// builds is skipped with a warning and the service starts empty.
pub async fn restore_catalog(
    engine: &SubstitutionEngine,
    repository: &dyn CatalogRepository,
) -> Result<(), BootstrapError> {
    let Some(snapshot) = repository.latest().await.map_err(BootstrapError::CatalogRestore)? else {
        info!(
            event_name = "system.bootstrap.catalog_absent",
            correlation_id = "bootstrap",
            "no stored catalog to restore"
        );
        return Ok(());
    };

    match engine.load_catalog(&snapshot.rows) {
        Ok(summary) => info!(
            event_name = "system.bootstrap.catalog_restored",
            correlation_id = "bootstrap",
            upload_id = %snapshot.metadata.id,
            source_name = %snapshot.metadata.source_name,
            products = summary.products,
            "stored catalog restored"
        ),
        Err(error) => warn!(
            event_name = "system.bootstrap.catalog_invalid",
            correlation_id = "bootstrap",
            upload_id = %snapshot.metadata.id,
            error = %error,
            "stored catalog could not be rebuilt"
        ),
    }

    Ok(())
}

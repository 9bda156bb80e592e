use std::sync::Arc;

use axum::Router;
use shopfront_core::config::{AppConfig, ConfigError, LoadOptions};
use shopfront_core::events::TracingEventSink;
use shopfront_db::repositories::ProductRepository;
use shopfront_db::{connect_with_settings, migrations, DbPool, SqlProductRepository};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{health, products};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub products: Arc<dyn ProductRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

impl Application {
    pub fn router(&self) -> Router {
        products::router(self.products.clone())
            .merge(health::router(self.db_pool.clone()))
            .layer(TraceLayer::new_for_http())
    }
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

    if config.database.apply_migrations {
        migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
        info!(
            event_name = "system.bootstrap.migrations_applied",
            correlation_id = "bootstrap",
            "database migrations applied"
        );
    }

    let products: Arc<dyn ProductRepository> =
        Arc::new(SqlProductRepository::new(Arc::new(db_pool.clone()), Arc::new(TracingEventSink)));

    Ok(Application { config, db_pool, products })
}

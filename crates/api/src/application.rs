use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use thiserror::Error;
use tracing::info;

use dotm_domain::clock::SystemClock;
use dotm_domain::config::{ApiConfig, ConfigError};
use dotm_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
use dotm_domain::services::SettingsResolver;
use dotm_domain::storage::StorageError;
use dotm_monitor::{NagiosSource, RefreshCoordinator, RefreshPolicy, SourceError};
use dotm_storage::RedisStore;

use crate::{
    handlers::{
        config_handler, config_value_handler, metrics_handler, mon_node_field_handler,
        mon_node_handler, mon_nodes_handler, mon_reload_handler, mon_services_handler,
        node_handler, nodes_handler, set_config_handler, settings_handler,
    },
    state::{AppState, SharedLock, SharedSource, SharedStore},
};

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;

    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    let redis = RedisStore::connect(config.redis_url()).await?;
    let use_aliases = SettingsResolver::new(redis.clone())
        .use_monitoring_aliases()
        .await?;
    let source: SharedSource = Arc::new(NagiosSource::from_config(
        config.monitoring(),
        use_aliases,
    )?);

    let store: SharedStore = Arc::new(redis.clone());
    let lock: SharedLock = Arc::new(redis);
    let coordinator = RefreshCoordinator::new(
        store.clone(),
        lock,
        source,
        Arc::new(SystemClock),
        RefreshPolicy::from(config.monitoring()),
    );
    let state = AppState::new(store, coordinator, telemetry);

    info!(address = config.api_bind_address(), "api listening");
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind(config.api_bind_address())?
    .run()
    .await?;

    Ok(())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/nodes", web::get().to(nodes_handler))
        .route("/nodes/{name}", web::get().to(node_handler))
        .route("/settings", web::get().to(settings_handler))
        .route("/mon/nodes", web::get().to(mon_nodes_handler))
        .route("/mon/nodes/{node}", web::get().to(mon_node_handler))
        .route("/mon/nodes/{node}/{key}", web::get().to(mon_node_field_handler))
        .route("/mon/services/{node}", web::get().to(mon_services_handler))
        .route("/mon/reload", web::post().to(mon_reload_handler))
        .route("/config", web::get().to(config_handler))
        .route("/config", web::post().to(set_config_handler))
        .route("/config/{variable}", web::get().to(config_value_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("monitor client error: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

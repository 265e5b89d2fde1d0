//! Scheduled refresher of the cached monitoring records.

use std::io;

use dotm_domain::config::MonitorConfig;
use dotm_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use dotm_monitor::{build_coordinator, build_nagios_source, run_monitor, MonitorError};
use dotm_storage::RedisStore;

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[monitor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let config = MonitorConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("MONITOR");
    let _telemetry = init_telemetry(&telemetry_config)?;
    let store = RedisStore::connect(config.redis_url()).await?;
    let source = build_nagios_source(&config, store.clone()).await?;
    let coordinator = build_coordinator(&config, store, source);
    run_monitor(coordinator, config.poll_interval()).await
}

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use dotm_domain::{
    clock::SystemClock,
    config::{ConfigError, MonitorConfig},
    services::{telemetry::TelemetryError, SettingsResolver},
    storage::{DistributedLock, KeyValueStore, StorageError},
};
use dotm_storage::RedisStore;

use crate::{
    coordinator::{RefreshCoordinator, RefreshOutcome, RefreshPolicy},
    source::{MonitorSource, NagiosSource, SourceError},
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("monitor source error: {0}")]
    Source(#[from] SourceError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Builds the Nagios client, honouring `nagios_use_aliases` from the store.
pub async fn build_nagios_source<S>(
    config: &MonitorConfig,
    store: S,
) -> Result<NagiosSource, MonitorError>
where
    S: KeyValueStore,
{
    let use_aliases = SettingsResolver::new(store).use_monitoring_aliases().await?;
    Ok(NagiosSource::from_config(config.monitoring(), use_aliases)?)
}

pub fn build_coordinator<M>(
    config: &MonitorConfig,
    store: RedisStore,
    source: M,
) -> RefreshCoordinator<RedisStore, RedisStore, M>
where
    M: MonitorSource,
{
    RefreshCoordinator::new(
        store.clone(),
        store,
        source,
        Arc::new(SystemClock),
        RefreshPolicy::from(config.monitoring()),
    )
}

/// One scheduled tick. The coordinator logs failures; the loop carries on
/// and a failed refresh leaves its lock to expire.
pub async fn poll_once<S, L, M>(
    coordinator: &RefreshCoordinator<S, L, M>,
) -> Option<RefreshOutcome>
where
    S: KeyValueStore + Clone,
    L: DistributedLock,
    M: MonitorSource,
{
    coordinator.request_refresh().await.ok()
}

/// Requests a refresh every `poll_interval` until ctrl-c.
pub async fn run_monitor<S, L, M>(
    coordinator: RefreshCoordinator<S, L, M>,
    poll_interval: Duration,
) -> Result<(), MonitorError>
where
    S: KeyValueStore + Clone,
    L: DistributedLock,
    M: MonitorSource,
{
    info!(interval_secs = poll_interval.as_secs(), "monitor loop started");
    loop {
        poll_once(&coordinator).await;
        tokio::select! {
            _ = sleep(poll_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MonitorRecords;
    use async_trait::async_trait;
    use dotm_domain::clock::ManualClock;
    use dotm_domain::keys::{MONITORING_CONFIG_KEY, REFRESH_CLOCK_FIELD};
    use dotm_domain::storage::MemoryStore;

    struct Unreachable;

    #[async_trait]
    impl MonitorSource for Unreachable {
        async fn fetch_nodes(&self) -> Result<MonitorRecords, SourceError> {
            Err(SourceError::Request("timed out".into()))
        }

        async fn fetch_services(&self) -> Result<MonitorRecords, SourceError> {
            Err(SourceError::Request("timed out".into()))
        }
    }

    fn coordinator(
        store: &MemoryStore,
        clock: Arc<ManualClock>,
    ) -> RefreshCoordinator<MemoryStore, MemoryStore, Unreachable> {
        RefreshCoordinator::new(
            store.clone(),
            store.clone(),
            Unreachable,
            clock,
            RefreshPolicy::new(Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn poll_once_primes_clock() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemoryStore::with_clock(clock.clone());
        let outcome = poll_once(&coordinator(&store, clock)).await;
        assert_eq!(outcome, Some(RefreshOutcome::Uninitialized));
    }

    #[tokio::test]
    async fn poll_once_swallows_source_failures() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemoryStore::with_clock(clock.clone());
        store
            .hash_set(MONITORING_CONFIG_KEY, REFRESH_CLOCK_FIELD, "0")
            .await
            .unwrap();
        assert_eq!(poll_once(&coordinator(&store, clock)).await, None);
    }
}

use std::sync::Arc;

use dotm_domain::services::{MonitoringReader, SettingsResolver, TelemetryGuard, TopologyReader};
use dotm_domain::storage::{DistributedLock, KeyValueStore};
use dotm_monitor::{MonitorSource, RefreshCoordinator};

pub type SharedStore = Arc<dyn KeyValueStore>;
pub type SharedLock = Arc<dyn DistributedLock>;
pub type SharedSource = Arc<dyn MonitorSource>;
pub type Coordinator = RefreshCoordinator<SharedStore, SharedLock, SharedSource>;

#[derive(Clone)]
pub struct AppState {
    topology: TopologyReader<SharedStore>,
    monitoring: MonitoringReader<SharedStore>,
    settings: SettingsResolver<SharedStore>,
    coordinator: Arc<Coordinator>,
    telemetry: TelemetryGuard,
}

impl AppState {
    pub fn new(store: SharedStore, coordinator: Coordinator, telemetry: TelemetryGuard) -> Self {
        Self {
            topology: TopologyReader::new(store.clone()),
            monitoring: MonitoringReader::new(store.clone()),
            settings: SettingsResolver::new(store),
            coordinator: Arc::new(coordinator),
            telemetry,
        }
    }

    pub fn topology(&self) -> &TopologyReader<SharedStore> {
        &self.topology
    }

    pub fn monitoring(&self) -> &MonitoringReader<SharedStore> {
        &self.monitoring
    }

    pub fn settings(&self) -> &SettingsResolver<SharedStore> {
        &self.settings
    }

    pub fn coordinator(&self) -> &Coordinator {
        self.coordinator.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }
}

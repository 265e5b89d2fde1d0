//! Read models over the shared store plus telemetry wiring.

pub mod monitoring;
pub mod settings;
pub mod telemetry;
pub mod topology;

pub use monitoring::MonitoringReader;
pub use settings::{AcceptAll, ConfigValidator, ConfigWriteError, SettingsResolver};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError, TelemetryGuard};
pub use topology::TopologyReader;

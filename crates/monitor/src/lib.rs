//! Monitoring refresh: pulls host and service status from Nagios/Icinga and
//! caches it in the shared store. The API embeds the coordinator for
//! on-demand refreshes; `dotm-monitor` drives it on a schedule.

pub mod coordinator;
pub mod source;
pub mod worker;

pub use coordinator::{
    RefreshCoordinator, RefreshError, RefreshOutcome, RefreshPolicy, SkipReason,
    MIN_REFRESH_INTERVAL, REFRESH_LOCK_TTL,
};
pub use source::{MonitorRecords, MonitorSource, NagiosSource, SourceError};
pub use worker::{build_coordinator, build_nagios_source, poll_once, run_monitor, MonitorError};

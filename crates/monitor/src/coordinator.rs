//! Rate-limited, non-overlapping refresh of cached monitoring records.
//!
//! Callers on any process may call [`RefreshCoordinator::request_refresh`]
//! concurrently. The refresh clock (`last_updated` in `dotm::checks::config`)
//! gates how often a refresh may run, and an expiring advisory lock keeps two
//! refreshes from overlapping. A refresher that dies while holding the lock
//! blocks further refreshes until the lock expires; nothing else unblocks it.

use std::{sync::Arc, time::Duration};

use dotm_domain::clock::Clock;
use dotm_domain::config::MonitoringConfig;
use dotm_domain::keys::{
    monitoring_node_key, monitoring_services_key, refresh_lock_key, MONITORING_CONFIG_KEY,
    REFRESH_CLOCK_FIELD,
};
use dotm_domain::services::SettingsResolver;
use dotm_domain::storage::{DistributedLock, KeyValueStore, ListRetention, StorageError};
use dotm_domain::FieldMap;
use metrics::{counter, gauge};
use strum_macros::IntoStaticStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::source::{MonitorSource, SourceError};

pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const REFRESH_LOCK_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub min_interval: Duration,
    pub lock_ttl: Duration,
    /// Record lifetime used when the store has no `nagios_instance.expire`.
    pub default_expiry: Duration,
    /// Cap on the per-node service history; `None` keeps every entry.
    pub service_history: Option<usize>,
}

impl RefreshPolicy {
    pub fn new(default_expiry: Duration) -> Self {
        Self {
            min_interval: MIN_REFRESH_INTERVAL,
            lock_ttl: REFRESH_LOCK_TTL,
            default_expiry,
            service_history: None,
        }
    }

    pub fn with_service_history(mut self, max_len: Option<usize>) -> Self {
        self.service_history = max_len;
        self
    }
}

impl From<&MonitoringConfig> for RefreshPolicy {
    fn from(config: &MonitoringConfig) -> Self {
        Self::new(config.expire()).with_service_history(config.service_history())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The minimum interval since the last refresh has not elapsed.
    Throttled,
    /// Another caller holds the refresh lock.
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No refresh clock existed; it is now primed with `0`.
    Uninitialized,
    Unchanged {
        last_updated: i64,
        reason: SkipReason,
    },
    Refreshed {
        last_updated: i64,
        nodes: usize,
        services: usize,
    },
}

impl RefreshOutcome {
    pub fn last_updated(&self) -> Option<i64> {
        match self {
            RefreshOutcome::Uninitialized => None,
            RefreshOutcome::Unchanged { last_updated, .. }
            | RefreshOutcome::Refreshed { last_updated, .. } => Some(*last_updated),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Uninitialized => "uninitialized",
            RefreshOutcome::Unchanged { reason, .. } => (*reason).into(),
            RefreshOutcome::Refreshed { .. } => "refreshed",
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("monitor error: {0}")]
    Source(#[from] SourceError),
    #[error("failed to encode monitor record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("refresh clock holds a non-numeric value `{0}`")]
    CorruptClock(String),
}

pub struct RefreshCoordinator<S, L, M> {
    store: S,
    lock: L,
    source: M,
    settings: SettingsResolver<S>,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
}

impl<S, L, M> RefreshCoordinator<S, L, M>
where
    S: KeyValueStore + Clone,
    L: DistributedLock,
    M: MonitorSource,
{
    pub fn new(store: S, lock: L, source: M, clock: Arc<dyn Clock>, policy: RefreshPolicy) -> Self {
        Self {
            settings: SettingsResolver::new(store.clone()),
            store,
            lock,
            source,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Runs a refresh when the interval has elapsed and nobody else is
    /// refreshing; otherwise reports the current clock. On error the lock is
    /// left to expire on its own.
    pub async fn request_refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let result = self.try_refresh().await;
        match &result {
            Ok(outcome) => {
                counter!("monitor_refresh_total", "result" => outcome.label()).increment(1);
            }
            Err(err) => {
                counter!("monitor_refresh_total", "result" => "error").increment(1);
                warn!(%err, "monitoring refresh failed");
            }
        }
        result
    }

    async fn try_refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let Some(last_updated) = self.read_clock().await? else {
            self.store
                .hash_set(MONITORING_CONFIG_KEY, REFRESH_CLOCK_FIELD, "0")
                .await?;
            info!("refresh clock initialized");
            return Ok(RefreshOutcome::Uninitialized);
        };

        if !self.interval_elapsed(last_updated) {
            return Ok(unchanged(last_updated, SkipReason::Throttled));
        }

        let lock_key = refresh_lock_key();
        if !self.lock.try_acquire(&lock_key, self.policy.lock_ttl).await? {
            debug!(last_updated, "refresh already running");
            return Ok(unchanged(last_updated, SkipReason::InProgress));
        }

        // A competing refresher may have finished between the clock read and
        // the lock acquisition.
        let last_updated = self.read_clock().await?.unwrap_or(last_updated);
        if !self.interval_elapsed(last_updated) {
            self.lock.release(&lock_key).await?;
            return Ok(unchanged(last_updated, SkipReason::Throttled));
        }

        let (nodes, services) = self.refresh_records().await?;

        let finished = self.clock.now().max(last_updated);
        self.store
            .hash_set(
                MONITORING_CONFIG_KEY,
                REFRESH_CLOCK_FIELD,
                &finished.to_string(),
            )
            .await?;
        self.lock.release(&lock_key).await?;

        gauge!("monitor_last_refresh").set(finished as f64);
        info!(nodes, services, last_updated = finished, "monitoring refreshed");
        Ok(RefreshOutcome::Refreshed {
            last_updated: finished,
            nodes,
            services,
        })
    }

    async fn read_clock(&self) -> Result<Option<i64>, RefreshError> {
        let Some(raw) = self
            .store
            .hash_get(MONITORING_CONFIG_KEY, REFRESH_CLOCK_FIELD)
            .await?
        else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|_| RefreshError::CorruptClock(raw))
    }

    fn interval_elapsed(&self, last_updated: i64) -> bool {
        self.clock.now().saturating_sub(last_updated) >= self.policy.min_interval.as_secs() as i64
    }

    /// Writes fresh records; must only run while holding the lock.
    async fn refresh_records(&self) -> Result<(usize, usize), RefreshError> {
        let expiry = self
            .settings
            .monitoring_expiry(self.policy.default_expiry)
            .await?;
        let aliases = self.settings.node_aliases().await?;

        let nodes = self.source.fetch_nodes().await?;
        for (name, snapshot) in &nodes {
            let payload = serde_json::to_string(snapshot)?;
            self.store
                .set_with_expiry(
                    &monitoring_node_key(resolve_alias(&aliases, name)),
                    &payload,
                    expiry,
                )
                .await?;
        }

        let services = self.source.fetch_services().await?;
        let retention = ListRetention {
            ttl: Some(expiry),
            max_len: self.policy.service_history,
        };
        for (name, checks) in &services {
            let payload = serde_json::to_string(checks)?;
            self.store
                .list_push(
                    &monitoring_services_key(resolve_alias(&aliases, name)),
                    &payload,
                    retention,
                )
                .await?;
        }

        Ok((nodes.len(), services.len()))
    }
}

fn unchanged(last_updated: i64, reason: SkipReason) -> RefreshOutcome {
    RefreshOutcome::Unchanged {
        last_updated,
        reason,
    }
}

fn resolve_alias<'a>(aliases: &'a FieldMap, name: &'a str) -> &'a str {
    aliases.get(name).map(String::as_str).unwrap_or(name)
}

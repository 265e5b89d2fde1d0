//! External monitoring system access.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use dotm_domain::config::MonitoringConfig;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

mod types;

pub use types::{HostStatus, ServiceStatus, StatusCgiResponse, StatusSection};

/// Monitor records keyed by node name.
pub type MonitorRecords = BTreeMap<String, Value>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("monitor request failed: {0}")]
    Request(String),
    #[error("monitor response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(value.to_string())
    }
}

/// Capability consumed by the refresh coordinator. Implementations bound
/// their own latency.
#[async_trait]
pub trait MonitorSource: Send + Sync {
    /// Snapshot per node.
    async fn fetch_nodes(&self) -> Result<MonitorRecords, SourceError>;
    /// Service check results per node.
    async fn fetch_services(&self) -> Result<MonitorRecords, SourceError>;
}

#[async_trait]
impl<T: MonitorSource + ?Sized> MonitorSource for Arc<T> {
    async fn fetch_nodes(&self) -> Result<MonitorRecords, SourceError> {
        (**self).fetch_nodes().await
    }

    async fn fetch_services(&self) -> Result<MonitorRecords, SourceError> {
        (**self).fetch_services().await
    }
}

/// Client for the classic Nagios/Icinga CGI JSON output.
pub struct NagiosSource {
    client: Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
    use_aliases: bool,
}

impl NagiosSource {
    /// `use_aliases` reports hosts under their display name when the CGI
    /// provides one.
    pub fn from_config(config: &MonitoringConfig, use_aliases: bool) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.url(),
            user: config.user().map(str::to_string),
            password: config.password().map(str::to_string),
            use_aliases,
        })
    }

    async fn fetch_status(&self, style: &str) -> Result<StatusCgiResponse, SourceError> {
        let url = status_url(&self.base_url, style);
        debug!(%url, "querying monitor");
        let mut request = self.client.get(&url);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }
        let body = request.send().await?.error_for_status()?.text().await?;
        serde_json::from_str(&body).map_err(|err| SourceError::Decode(err.to_string()))
    }
}

#[async_trait]
impl MonitorSource for NagiosSource {
    async fn fetch_nodes(&self) -> Result<MonitorRecords, SourceError> {
        let response = self.fetch_status("hostdetail").await?;
        collect_nodes(response.status.host_status, self.use_aliases)
    }

    async fn fetch_services(&self) -> Result<MonitorRecords, SourceError> {
        let response = self.fetch_status("detail").await?;
        collect_services(response.status.service_status, self.use_aliases)
    }
}

fn status_url(base_url: &str, style: &str) -> String {
    format!("{base_url}status.cgi?host=all&style={style}&jsonoutput")
}

fn reported_name(host_name: &str, display_name: Option<&str>, use_aliases: bool) -> String {
    match display_name {
        Some(alias) if use_aliases && !alias.trim().is_empty() => alias.trim().to_string(),
        _ => host_name.to_string(),
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, SourceError> {
    serde_json::to_value(value).map_err(|err| SourceError::Decode(err.to_string()))
}

/// One snapshot per host.
pub fn collect_nodes(
    hosts: Vec<HostStatus>,
    use_aliases: bool,
) -> Result<MonitorRecords, SourceError> {
    let mut records = MonitorRecords::new();
    for host in hosts {
        let name = reported_name(&host.host_name, host.host_display_name.as_deref(), use_aliases);
        records.insert(name, encode(&host)?);
    }
    Ok(records)
}

/// Service checks grouped into one JSON array per host.
pub fn collect_services(
    services: Vec<ServiceStatus>,
    use_aliases: bool,
) -> Result<MonitorRecords, SourceError> {
    let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for service in services {
        let name = reported_name(
            &service.host_name,
            service.host_display_name.as_deref(),
            use_aliases,
        );
        grouped.entry(name).or_default().push(encode(&service)?);
    }
    Ok(grouped
        .into_iter()
        .map(|(name, checks)| (name, Value::Array(checks)))
        .collect())
}

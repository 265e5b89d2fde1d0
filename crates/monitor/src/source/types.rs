use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `status.cgi?...&jsonoutput` on a classic Nagios/Icinga CGI.
#[derive(Debug, Deserialize, Default)]
pub struct StatusCgiResponse {
    #[serde(default)]
    pub status: StatusSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct StatusSection {
    #[serde(default)]
    pub host_status: Vec<HostStatus>,
    #[serde(default)]
    pub service_status: Vec<ServiceStatus>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HostStatus {
    #[serde(alias = "host")]
    pub host_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_display_name: Option<String>,
    /// Everything else the CGI reports (status, last_check, ...), kept as-is.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceStatus {
    #[serde(alias = "host")]
    pub host_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_display_name: Option<String>,
    #[serde(alias = "service")]
    pub service_description: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

//! Composite key layout of the shared store.
//!
//! Every record lives under a `dotm::` prefix and joins its identifying
//! segments with `::`. These prefixes are the on-store contract shared with
//! the collectors that populate the topology, so they must not change.

/// Segment delimiter used by every composite key.
pub const DELIMITER: &str = "::";

/// Ordered list of every known node name.
pub const NODES_LIST_KEY: &str = "dotm::nodes";
pub const NODES_PREFIX: &str = "dotm::nodes::";
pub const SERVICES_PREFIX: &str = "dotm::services::";
pub const CONNECTIONS_PREFIX: &str = "dotm::connections::";

pub const MONITORING_NODES_PREFIX: &str = "dotm::checks::nodes::";
pub const MONITORING_SERVICES_PREFIX: &str = "dotm::checks::services::";
/// Hash holding coordinator bookkeeping (the refresh clock).
pub const MONITORING_CONFIG_KEY: &str = "dotm::checks::config";
pub const MONITORING_CONFIG_PREFIX: &str = "dotm::checks::config::";

/// Raw configuration hash written by `set_config`.
pub const CONFIG_KEY: &str = "dotm::config";
pub const CONFIG_PREFIX: &str = "dotm::config::";

/// Field of [`MONITORING_CONFIG_KEY`] recording the last completed refresh.
pub const REFRESH_CLOCK_FIELD: &str = "last_updated";

/// Key family a composite key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind<'a> {
    Node,
    Service { node: &'a str },
    Connection { node: &'a str },
    MonitoringNode,
    MonitoringServices,
    MonitoringConfig,
    Setting,
}

impl KeyKind<'_> {
    /// Prefix that every key of this kind starts with.
    pub fn prefix(&self) -> String {
        match self {
            KeyKind::Node => NODES_PREFIX.to_string(),
            KeyKind::Service { node } => format!("{SERVICES_PREFIX}{node}{DELIMITER}"),
            KeyKind::Connection { node } => format!("{CONNECTIONS_PREFIX}{node}{DELIMITER}"),
            KeyKind::MonitoringNode => MONITORING_NODES_PREFIX.to_string(),
            KeyKind::MonitoringServices => MONITORING_SERVICES_PREFIX.to_string(),
            KeyKind::MonitoringConfig => MONITORING_CONFIG_PREFIX.to_string(),
            KeyKind::Setting => CONFIG_PREFIX.to_string(),
        }
    }
}

/// Joins `segments` under the prefix of `kind`.
pub fn encode(kind: KeyKind<'_>, segments: &[&str]) -> String {
    let mut key = kind.prefix();
    key.push_str(&segments.join(DELIMITER));
    key
}

pub fn node_key(node: &str) -> String {
    encode(KeyKind::Node, &[node])
}

pub fn service_key(node: &str, service: &str) -> String {
    encode(KeyKind::Service { node }, &[service])
}

pub fn connection_key(node: &str, local_port: &str, remote_host: &str) -> String {
    encode(KeyKind::Connection { node }, &[local_port, remote_host])
}

pub fn monitoring_node_key(node: &str) -> String {
    encode(KeyKind::MonitoringNode, &[node])
}

pub fn monitoring_services_key(node: &str) -> String {
    encode(KeyKind::MonitoringServices, &[node])
}

pub fn setting_key(name: &str) -> String {
    encode(KeyKind::Setting, &[name])
}

/// Advisory lock held while a refresh is running.
pub fn refresh_lock_key() -> String {
    encode(KeyKind::MonitoringConfig, &["update_running"])
}

/// Structured form of a `dotm::connections::<source>::<port>::<host>` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionKey<'a> {
    pub source: &'a str,
    pub local_port: &'a str,
    pub remote_host: &'a str,
}

/// Decodes a full connection key. Anything that is not exactly three segments
/// after the connections prefix yields `None`.
pub fn decode_connection(key: &str) -> Option<ConnectionKey<'_>> {
    let rest = key.strip_prefix(CONNECTIONS_PREFIX)?;
    let (source, suffix) = rest.split_once(DELIMITER)?;
    if source.is_empty() {
        return None;
    }
    let (local_port, remote_host) = split_connection_suffix(suffix)?;
    Some(ConnectionKey {
        source,
        local_port,
        remote_host,
    })
}

/// Splits the node-scoped `<localPort>::<remoteHost>` suffix of a connection
/// key. Suffixes with any other segment count yield `None`.
pub fn split_connection_suffix(suffix: &str) -> Option<(&str, &str)> {
    let (local_port, remote_host) = suffix.split_once(DELIMITER)?;
    if local_port.is_empty() || remote_host.is_empty() || remote_host.contains(DELIMITER) {
        return None;
    }
    Some((local_port, remote_host))
}

/// Node name of a `dotm::checks::nodes::<node>` key.
pub fn decode_monitoring_node(key: &str) -> Option<&str> {
    key.strip_prefix(MONITORING_NODES_PREFIX)
        .filter(|node| !node.is_empty())
}

/// Crude topology-noise predicate: purely numeric segments are ports, not
/// hosts, and anything starting with `127` is treated as loopback.
pub fn is_internal_endpoint(segment: &str) -> bool {
    let numeric = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
    numeric || segment.starts_with("127")
}

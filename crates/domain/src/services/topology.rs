//! Node and connection views assembled from the topology key space.

use std::collections::BTreeMap;

use tracing::debug;

use crate::keys::{
    decode_connection, is_internal_endpoint, monitoring_node_key, node_key,
    split_connection_suffix, KeyKind, CONNECTIONS_PREFIX, NODES_LIST_KEY,
};
use crate::model::{ConnectionEdge, FieldMap, NodeDetail, NodeListing, NodeSettings, Setting};
use crate::storage::{KeyValueStore, StorageResult};

use super::monitoring::parse_record;
use super::settings::SettingsResolver;

#[derive(Clone)]
pub struct TopologyReader<S> {
    store: S,
    settings: SettingsResolver<S>,
}

impl<S: KeyValueStore + Clone> TopologyReader<S> {
    pub fn new(store: S) -> Self {
        Self {
            settings: SettingsResolver::new(store.clone()),
            store,
        }
    }

    /// All node names in store order plus the global, noise-filtered
    /// connection graph.
    pub async fn list_nodes(&self) -> StorageResult<NodeListing> {
        let nodes = self.store.list_range(NODES_LIST_KEY).await?;
        let mut keys = self.store.keys_with_prefix(CONNECTIONS_PREFIX).await?;
        keys.sort();

        let connections = keys
            .iter()
            .filter_map(|key| decode_connection(key))
            .filter(|conn| {
                !(is_internal_endpoint(conn.source) || is_internal_endpoint(conn.remote_host))
            })
            .map(|conn| ConnectionEdge {
                source: conn.source.to_string(),
                destination: conn.remote_host.to_string(),
            })
            .collect();

        Ok(NodeListing { nodes, connections })
    }

    /// Detail view of one node. Unknown nodes produce empty maps.
    pub async fn get_node(&self, name: &str) -> StorageResult<NodeDetail> {
        let status = self.store.hash_get_all(&node_key(name)).await?;

        let service_prefix = KeyKind::Service { node: name }.prefix();
        let mut services = BTreeMap::new();
        for key in self.store.keys_with_prefix(&service_prefix).await? {
            let Some(service) = key.strip_prefix(&service_prefix) else {
                continue;
            };
            services.insert(service.to_string(), self.store.hash_get_all(&key).await?);
        }

        let connection_prefix = KeyKind::Connection { node: name }.prefix();
        let mut connections = BTreeMap::new();
        for key in self.store.keys_with_prefix(&connection_prefix).await? {
            let Some(suffix) = key.strip_prefix(&connection_prefix) else {
                continue;
            };
            let Some((local_port, remote_host)) = split_connection_suffix(suffix) else {
                debug!(%key, "skipping partial connection key");
                continue;
            };
            let mut fields: FieldMap = self.store.hash_get_all(&key).await?;
            fields.insert("localPort".to_string(), local_port.to_string());
            fields.insert("remoteHost".to_string(), remote_host.to_string());
            connections.insert(suffix.to_string(), fields);
        }

        let monitoring = self
            .store
            .get(&monitoring_node_key(name))
            .await?
            .map(|raw| parse_record(&raw));

        let settings = NodeSettings {
            service_aging: self.settings.scalar(Setting::ServiceAging).await?,
            connection_aging: self.settings.scalar(Setting::ConnectionAging).await?,
        };

        Ok(NodeDetail {
            name: name.to_string(),
            status,
            services,
            connections,
            monitoring,
            settings,
        })
    }
}

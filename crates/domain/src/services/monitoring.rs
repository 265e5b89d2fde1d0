//! Read access to cached monitoring records.

use serde_json::{Map, Value};

use crate::keys::{
    decode_monitoring_node, monitoring_node_key, monitoring_services_key, MONITORING_NODES_PREFIX,
};
use crate::storage::{KeyValueStore, StorageResult};

/// Records are JSON written by the refresh coordinator; anything else is
/// surfaced verbatim as a string.
pub(crate) fn parse_record(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[derive(Clone)]
pub struct MonitoringReader<S> {
    store: S,
}

impl<S: KeyValueStore> MonitoringReader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Names of nodes that currently have a snapshot.
    pub async fn list_monitored_nodes(&self) -> StorageResult<Vec<String>> {
        let mut keys = self.store.keys_with_prefix(MONITORING_NODES_PREFIX).await?;
        keys.sort();
        Ok(keys
            .iter()
            .filter_map(|key| decode_monitoring_node(key))
            .map(str::to_string)
            .collect())
    }

    pub async fn get_monitoring_snapshot(&self, node: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .store
            .get(&monitoring_node_key(node))
            .await?
            .map(|raw| parse_record(&raw)))
    }

    /// Service check history, newest first.
    pub async fn get_monitoring_services(&self, node: &str) -> StorageResult<Vec<Value>> {
        Ok(self
            .store
            .list_range(&monitoring_services_key(node))
            .await?
            .iter()
            .map(|raw| parse_record(raw))
            .collect())
    }

    /// `{key: value}` for one field of the node snapshot.
    pub async fn get_monitoring_field(
        &self,
        node: &str,
        key: &str,
    ) -> StorageResult<Option<Value>> {
        let Some(Value::Object(snapshot)) = self.get_monitoring_snapshot(node).await? else {
            return Ok(None);
        };
        Ok(snapshot.get(key).map(|value| {
            let mut single = Map::new();
            single.insert(key.to_string(), value.clone());
            Value::Object(single)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ListRetention, MemoryStore};
    use serde_json::json;

    async fn seeded() -> MonitoringReader<MemoryStore> {
        let store = MemoryStore::new();
        store
            .set(
                &monitoring_node_key("web1"),
                r#"{"status":"UP","plugin_output":"PING OK"}"#,
            )
            .await
            .unwrap();
        store.set(&monitoring_node_key("db1"), "not json").await.unwrap();
        for entry in [r#"[{"service":"http","status":"OK"}]"#, r#"[{"service":"http","status":"CRITICAL"}]"#] {
            store
                .list_push(&monitoring_services_key("web1"), entry, ListRetention::default())
                .await
                .unwrap();
        }
        MonitoringReader::new(store)
    }

    #[tokio::test]
    async fn lists_monitored_nodes() {
        let reader = seeded().await;
        assert_eq!(reader.list_monitored_nodes().await.unwrap(), vec!["db1", "web1"]);
    }

    #[tokio::test]
    async fn reads_snapshots() {
        let reader = seeded().await;
        assert_eq!(
            reader.get_monitoring_snapshot("web1").await.unwrap(),
            Some(json!({"status": "UP", "plugin_output": "PING OK"}))
        );
        assert_eq!(
            reader.get_monitoring_snapshot("db1").await.unwrap(),
            Some(json!("not json"))
        );
        assert_eq!(reader.get_monitoring_snapshot("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn service_history_is_newest_first() {
        let reader = seeded().await;
        let history = reader.get_monitoring_services("web1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0][0]["status"], "CRITICAL");
        assert!(reader.get_monitoring_services("db1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_field_lookup() {
        let reader = seeded().await;
        assert_eq!(
            reader.get_monitoring_field("web1", "status").await.unwrap(),
            Some(json!({"status": "UP"}))
        );
        assert_eq!(reader.get_monitoring_field("web1", "missing").await.unwrap(), None);
        assert_eq!(reader.get_monitoring_field("db1", "status").await.unwrap(), None);
    }
}

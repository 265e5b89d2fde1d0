//! Redis-backed adapter satisfying the domain store and lock traits.

mod kv_store;
mod lock_store;

use dotm_domain::storage::{StorageError, StorageResult};
use redis::aio::ConnectionManager;

/// Shared store handle used by the HTTP API and monitor services. Clones share
/// one multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connects to the provided Redis URL.
    pub async fn connect(redis_url: &str) -> StorageResult<Self> {
        let client = redis::Client::open(redis_url).map_err(StorageError::from_source)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(StorageError::from_source)?;
        tracing::debug!("redis connection established");
        Ok(Self { manager })
    }

    pub(crate) fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

/// Maps server replies onto the domain error, keeping type mismatches
/// distinguishable.
pub(crate) fn map_redis_error(key: &str, err: redis::RedisError) -> StorageError {
    if err.code() == Some("WRONGTYPE") {
        StorageError::WrongType(key.to_string())
    } else {
        StorageError::from_source(err)
    }
}

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("key `{0}` holds a value of the wrong type")]
    WrongType(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Retention applied to a list on push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListRetention {
    /// Expiry reset on every push.
    pub ttl: Option<Duration>,
    /// Newest entries kept; older ones are trimmed.
    pub max_len: Option<usize>,
}

/// The subset of the shared key-value store used by DOTM. Single-key
/// operations are atomic; nothing spans keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;
    /// Returns `true` when a key was removed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;
    async fn exists(&self, key: &str) -> StorageResult<bool>;
    /// Remaining time to live; `None` for missing or persistent keys.
    async fn ttl(&self, key: &str) -> StorageResult<Option<Duration>>;

    async fn hash_get(&self, key: &str, field: &str) -> StorageResult<Option<String>>;
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StorageResult<()>;
    async fn hash_get_all(&self, key: &str) -> StorageResult<BTreeMap<String, String>>;

    /// Prepends `value` and applies `retention` in one atomic step.
    async fn list_push(
        &self,
        key: &str,
        value: &str,
        retention: ListRetention,
    ) -> StorageResult<()>;
    /// Whole list, head first.
    async fn list_range(&self, key: &str) -> StorageResult<Vec<String>>;

    async fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Best-effort mutual exclusion backed by an expiring marker. There is no
/// fencing token: a holder that outlives `ttl` loses exclusivity silently.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Creates the marker if absent. `false` means someone else holds it.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> StorageResult<bool>;
    async fn release(&self, key: &str) -> StorageResult<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        (**self).set_with_expiry(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        (**self).delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        (**self).exists(key).await
    }

    async fn ttl(&self, key: &str) -> StorageResult<Option<Duration>> {
        (**self).ttl(key).await
    }

    async fn hash_get(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        (**self).hash_get(key, field).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StorageResult<()> {
        (**self).hash_set(key, field, value).await
    }

    async fn hash_get_all(&self, key: &str) -> StorageResult<BTreeMap<String, String>> {
        (**self).hash_get_all(key).await
    }

    async fn list_push(
        &self,
        key: &str,
        value: &str,
        retention: ListRetention,
    ) -> StorageResult<()> {
        (**self).list_push(key, value, retention).await
    }

    async fn list_range(&self, key: &str) -> StorageResult<Vec<String>> {
        (**self).list_range(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        (**self).keys_with_prefix(prefix).await
    }
}

#[async_trait]
impl<T: DistributedLock + ?Sized> DistributedLock for Arc<T> {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        (**self).try_acquire(key, ttl).await
    }

    async fn release(&self, key: &str) -> StorageResult<()> {
        (**self).release(key).await
    }
}

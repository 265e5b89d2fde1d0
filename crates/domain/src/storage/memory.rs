//! In-process store with Redis-like semantics, used by tests and local runs.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;

use crate::clock::{Clock, SystemClock};

use super::traits::{DistributedLock, KeyValueStore, ListRetention, StorageError, StorageResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(BTreeMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

/// Shared handle; clones see the same data.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Expiry is evaluated against `clock`, so a manual clock can age keys.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            clock,
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, Entry>>> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("memory store mutex poisoned".into()))?;
        let now = self.clock.now();
        guard.retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        Ok(guard)
    }

    fn expiry_from(&self, ttl: Duration) -> i64 {
        self.clock.now() + ttl.as_secs().max(1) as i64
    }
}

fn wrong_type(key: &str) -> StorageError {
    StorageError::WrongType(key.to_string())
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self.lock()?;
        match guard.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.lock()?;
        guard.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let expires_at = Some(self.expiry_from(ttl));
        let mut guard = self.lock()?;
        guard.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut guard = self.lock()?;
        Ok(guard.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let guard = self.lock()?;
        Ok(guard.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> StorageResult<Option<Duration>> {
        let now = self.clock.now();
        let guard = self.lock()?;
        Ok(guard
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| Duration::from_secs((at - now).max(0) as u64)))
    }

    async fn hash_get(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        let guard = self.lock()?;
        match guard.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.lock()?;
        let entry = guard.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(BTreeMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Hash(hash) => {
                hash.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hash_get_all(&self, key: &str) -> StorageResult<BTreeMap<String, String>> {
        let guard = self.lock()?;
        match guard.get(key).map(|entry| &entry.value) {
            None => Ok(BTreeMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_push(
        &self,
        key: &str,
        value: &str,
        retention: ListRetention,
    ) -> StorageResult<()> {
        let expires_at = retention.ttl.map(|ttl| self.expiry_from(ttl));
        let mut guard = self.lock()?;
        let entry = guard.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });
        let Value::List(list) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        list.push_front(value.to_string());
        if let Some(max_len) = retention.max_len {
            list.truncate(max_len.max(1));
        }
        if expires_at.is_some() {
            entry.expires_at = expires_at;
        }
        Ok(())
    }

    async fn list_range(&self, key: &str) -> StorageResult<Vec<String>> {
        let guard = self.lock()?;
        match guard.get(key).map(|entry| &entry.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let guard = self.lock()?;
        Ok(guard
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DistributedLock for MemoryStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        let expires_at = Some(self.expiry_from(ttl));
        let mut guard = self.lock()?;
        if guard.contains_key(key) {
            return Ok(false);
        }
        guard.insert(
            key.to_string(),
            Entry {
                value: Value::Str("1".to_string()),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str) -> StorageResult<()> {
        let mut guard = self.lock()?;
        guard.remove(key);
        Ok(())
    }
}

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use async_trait::async_trait;
use dotm_domain::storage::{KeyValueStore, ListRetention, StorageResult};
use redis::{AsyncCommands, AsyncIter};

use crate::{map_redis_error, RedisStore};

/// Escapes glob metacharacters so a prefix scan matches literally.
pub(crate) fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.connection();
        conn.get(key).await.map_err(|err| map_redis_error(key, err))
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut conn = self.connection();
        conn.set(key, value)
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let mut conn = self.connection();
        // SET key value EX seconds
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(expiry_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut conn = self.connection();
        let removed: i64 = conn.del(key).await.map_err(|err| map_redis_error(key, err))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let mut conn = self.connection();
        conn.exists(key)
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn ttl(&self, key: &str) -> StorageResult<Option<Duration>> {
        let mut conn = self.connection();
        let remaining: i64 = conn.ttl(key).await.map_err(|err| map_redis_error(key, err))?;
        // -2: missing key, -1: no expiry.
        Ok((remaining >= 0).then(|| Duration::from_secs(remaining as u64)))
    }

    async fn hash_get(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        let mut conn = self.connection();
        conn.hget(key, field)
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StorageResult<()> {
        let mut conn = self.connection();
        conn.hset(key, field, value)
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn hash_get_all(&self, key: &str) -> StorageResult<BTreeMap<String, String>> {
        let mut conn = self.connection();
        let fields: HashMap<String, String> = conn
            .hgetall(key)
            .await
            .map_err(|err| map_redis_error(key, err))?;
        Ok(fields.into_iter().collect())
    }

    async fn list_push(
        &self,
        key: &str,
        value: &str,
        retention: ListRetention,
    ) -> StorageResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic().lpush(key, value).ignore();
        if let Some(ttl) = retention.ttl {
            pipe.expire(key, expiry_secs(ttl) as i64).ignore();
        }
        if let Some(max_len) = retention.max_len {
            pipe.ltrim(key, 0, max_len.max(1) as isize - 1).ignore();
        }
        let mut conn = self.connection();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn list_range(&self, key: &str) -> StorageResult<Vec<String>> {
        let mut conn = self.connection();
        conn.lrange(key, 0, -1)
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let pattern = scan_pattern(prefix);
        let mut conn = self.connection();
        let mut keys = Vec::new();
        {
            let mut iter: AsyncIter<'_, String> = conn
                .scan_match(&pattern)
                .await
                .map_err(|err| map_redis_error(prefix, err))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        // SCAN may report a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

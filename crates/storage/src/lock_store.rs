use std::time::Duration;

use async_trait::async_trait;
use dotm_domain::storage::{DistributedLock, StorageResult};
use redis::AsyncCommands;

use crate::{map_redis_error, RedisStore};

#[async_trait]
impl DistributedLock for RedisStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        let mut conn = self.connection();
        // SET key 1 NX EX ttl replies OK when created, nil when already held.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error(key, err))?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.connection();
        let _: i64 = conn.del(key).await.map_err(|err| map_redis_error(key, err))?;
        Ok(())
    }
}

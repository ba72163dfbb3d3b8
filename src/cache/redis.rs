use std::time::Duration;

use deadpool_redis::{
    Config as RedisConfig, Pool as RedisPool, Runtime,
    redis::{self, AsyncCommands},
};

use crate::cache::CacheLayer;
use crate::error::CacheError;

/// Redis-backed cache layer over a deadpool connection pool.
#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
}

impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Build a pool from a `redis://` or `rediss://` URL. No connection is made yet.
    pub fn try_from_redis_url(redis_url: &str) -> Result<Self, CacheError> {
        let pool = RedisConfig::from_url(redis_url).create_pool(Some(Runtime::Tokio1))?;
        Ok(Self::new(pool))
    }

    /// Round-trip a PING to confirm the server is reachable.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

impl CacheLayer for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        // SET .. EX rejects 0.
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let _: usize = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn redis_url() -> String {
        env::var("TEST_REDIS_URL")
            .or_else(|_| env::var("REDIS_URL"))
            .unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    fn unique_key(prefix: &str) -> String {
        format!("{}:{:x}", prefix, uuid::Uuid::new_v4().as_u128())
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(RedisCache::try_from_redis_url("not a url").is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn set_get_delete_roundtrip() {
        let cache = RedisCache::try_from_redis_url(&redis_url()).unwrap();
        cache.ping().await.unwrap();

        let key = unique_key("resolution");
        cache
            .set(&key, "https://example.com/", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get(&key).await.unwrap().as_deref(),
            Some("https://example.com/")
        );

        cache.delete(&key).await.unwrap();
        cache.delete(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn entries_expire_server_side() {
        let cache = RedisCache::try_from_redis_url(&redis_url()).unwrap();
        let key = unique_key("analytics");

        cache.set(&key, "{}", Duration::from_secs(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }
}

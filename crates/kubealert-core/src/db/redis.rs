//! Redis connection and lock leases

use std::time::Duration;

use deadpool_redis::{Config as RedisConfig, Pool, Runtime};
use once_cell::sync::Lazy;
use redis::Script;

use crate::error::{Error, Result};

/// Deletes a key only while it still holds the caller's token
static RELEASE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#,
    )
});

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
    lock_ttl: Duration,
}

impl RedisPool {
    /// Create a new Redis connection pool
    pub fn new(url: &str, lock_ttl: Duration) -> Result<Self> {
        let pool = RedisConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Redis(e.to_string()))?;

        Ok(Self { pool, lock_ttl })
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Try to take `key` for `token`; `false` if someone else holds it
    pub async fn try_lease(&self, key: &str, token: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let ttl_ms = u64::try_from(self.lock_ttl.as_millis()).unwrap_or(u64::MAX);
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    /// Give `key` back if `token` still holds it
    pub async fn release_lease(&self, key: &str, token: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = RELEASE_SCRIPT
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }
}

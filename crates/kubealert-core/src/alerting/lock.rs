//! Serialization of concurrent alert creations in one scope

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::RedisPool;
use crate::error::Result;
use crate::models::ScopeContext;

/// Pause between attempts on a lease held by another replica
const LEASE_RETRY: Duration = Duration::from_millis(50);

/// Lock key for creating `names` in `scope`
///
/// Order and repetition of `names` do not matter.
pub fn lock_key(scope: &ScopeContext, names: &[String]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(scope.search_blob().as_bytes());
    hasher.update(b"/");
    hasher.update(sorted.join(",").as_bytes());
    format!("kubealert:create:{}", hex::encode(hasher.finalize()))
}

/// Lock held between the uniqueness check and the alert insert
#[derive(Clone)]
pub enum CreationLock {
    /// Serializes callers within this process
    Local(Arc<DashMap<String, Arc<Mutex<()>>>>),
    /// Serializes callers across replicas sharing a Redis
    Redis(RedisPool),
}

impl CreationLock {
    /// An in-process lock table
    pub fn local() -> Self {
        Self::Local(Arc::new(DashMap::new()))
    }

    /// Redis leases when a pool is configured, else in-process
    pub fn from_redis(redis: Option<RedisPool>) -> Self {
        redis.map_or_else(Self::local, Self::Redis)
    }

    /// Wait for `key`
    pub async fn acquire(&self, key: &str) -> Result<LockGuard> {
        match self {
            Self::Local(table) => {
                let mutex = table.entry(key.to_string()).or_default().clone();
                let guard = mutex.lock_owned().await;
                Ok(LockGuard::Local(LocalLease {
                    table: table.clone(),
                    key: key.to_string(),
                    guard: Some(guard),
                }))
            }
            Self::Redis(pool) => {
                let token = Uuid::new_v4().to_string();
                while !pool.try_lease(key, &token).await? {
                    tokio::time::sleep(LEASE_RETRY).await;
                }
                debug!(key, "Acquired creation lease");
                Ok(LockGuard::Redis {
                    pool: pool.clone(),
                    key: key.to_string(),
                    token,
                })
            }
        }
    }
}

/// A held in-process lock
///
/// Dropping it unlocks and removes the table entry once nobody else holds
/// or waits on it, including when the holding future is cancelled.
pub struct LocalLease {
    table: Arc<DashMap<String, Arc<Mutex<()>>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LocalLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table still references an idle mutex
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// A held creation lock
///
/// Dropping the guard frees a local lock; a Redis lease dropped without
/// [`LockGuard::release`] lapses when its TTL runs out.
pub enum LockGuard {
    /// In-process lock
    Local(LocalLease),
    /// Redis lease
    Redis {
        pool: RedisPool,
        key: String,
        token: String,
    },
}

impl LockGuard {
    /// Give the lock back
    pub async fn release(self) {
        match self {
            Self::Local(lease) => drop(lease),
            Self::Redis { pool, key, token } => match pool.release_lease(&key, &token).await {
                Ok(true) => debug!(key, "Released creation lease"),
                Ok(false) => warn!(key, "Creation lease expired before release"),
                Err(e) => warn!(key, error = %e, "Failed to release creation lease"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_ignores_name_order() {
        let scope = ScopeContext::Namespace {
            ns_name: Some("ns1".into()),
        };
        assert_eq!(
            lock_key(&scope, &names(&["b", "a"])),
            lock_key(&scope, &names(&["a", "b", "a"]))
        );
        assert_ne!(
            lock_key(&scope, &names(&["a"])),
            lock_key(&ScopeContext::Cluster, &names(&["a"]))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn local_lock_serializes_holders() {
        let lock = CreationLock::local();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                tokio::spawn(async move {
                    let guard = lock.acquire("k").await.unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    guard.release().await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(local_entries(&lock), 0);
    }

    #[tokio::test]
    async fn cancelled_holder_frees_its_entry() {
        let lock = CreationLock::local();

        let held = lock.clone();
        let timed_out = tokio::time::timeout(Duration::from_millis(20), async move {
            let _guard = held.acquire("k").await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;
        assert!(timed_out.is_err());
        assert_eq!(local_entries(&lock), 0);

        // The key can be taken again right away
        let guard = tokio::time::timeout(Duration::from_millis(100), lock.acquire("k"))
            .await
            .expect("lock was left held")
            .unwrap();
        assert_eq!(local_entries(&lock), 1);
        drop(guard);
        assert_eq!(local_entries(&lock), 0);
    }

    fn local_entries(lock: &CreationLock) -> usize {
        match lock {
            CreationLock::Local(table) => table.len(),
            CreationLock::Redis(_) => unreachable!(),
        }
    }
}

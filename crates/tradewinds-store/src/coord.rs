//! Coordination service client: scheduler leader lease and the per-dataset
//! last-success TTL cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;

/// Proof of lease ownership; required to release the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken {
    pub name: String,
    token: String,
}

#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Non-blocking attempt to take the named time-boxed lock.
    async fn try_acquire(
        &self,
        name: &str,
        lease: Duration,
    ) -> Result<Option<LeaseToken>, StoreError>;

    /// Release the lock if this token still owns it.
    async fn release(&self, token: LeaseToken) -> Result<(), StoreError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn ping(&self) -> bool;
}

#[derive(Clone)]
pub struct RedisCoordinator {
    manager: ConnectionManager,
}

impl RedisCoordinator {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl Coordinator for RedisCoordinator {
    async fn try_acquire(
        &self,
        name: &str,
        lease: Duration,
    ) -> Result<Option<LeaseToken>, StoreError> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(name)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.map(|_| LeaseToken {
            name: name.to_string(),
            token,
        }))
    }

    async fn release(&self, token: LeaseToken) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let holder: Option<String> = redis::cmd("GET")
            .arg(&token.name)
            .query_async(&mut conn)
            .await?;
        if holder.as_deref() == Some(token.token.as_str()) {
            redis::cmd("DEL")
                .arg(&token.name)
                .query_async::<()>(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(redis::cmd("GET").arg(key).query_async(&mut conn).await?)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

/// In-process coordinator with real lease expiry, for tests and single-node
/// development runs.
#[derive(Default)]
pub struct MemoryCoordinator {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn expired(deadline: &Option<Instant>) -> bool {
        deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn try_acquire(
        &self,
        name: &str,
        lease: Duration,
    ) -> Result<Option<LeaseToken>, StoreError> {
        let mut entries = self.entries.lock().await;
        if let Some((_, deadline)) = entries.get(name) {
            if !Self::expired(deadline) {
                return Ok(None);
            }
        }
        let token = Uuid::new_v4().to_string();
        entries.insert(
            name.to_string(),
            (token.clone(), Some(Instant::now() + lease)),
        );
        Ok(Some(LeaseToken {
            name: name.to_string(),
            token,
        }))
    }

    async fn release(&self, token: LeaseToken) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if let Some((holder, _)) = entries.get(&token.name) {
            if *holder == token.token {
                entries.remove(&token.name);
            }
        }
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.lock().await.insert(
            key.to_string(),
            (value.to_string(), Some(Instant::now() + ttl)),
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).and_then(|(value, deadline)| {
            if Self::expired(deadline) {
                None
            } else {
                Some(value.clone())
            }
        }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_one_contender_takes_the_lock() {
        let coord = MemoryCoordinator::new();
        let lease = Duration::from_secs(60);
        let first = coord.try_acquire("scheduler_lock", lease).await.unwrap();
        let second = coord.try_acquire("scheduler_lock", lease).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn released_lock_can_be_reacquired() {
        let coord = MemoryCoordinator::new();
        let lease = Duration::from_secs(60);
        let token = coord
            .try_acquire("scheduler_lock", lease)
            .await
            .unwrap()
            .unwrap();
        coord.release(token).await.unwrap();
        assert!(coord
            .try_acquire("scheduler_lock", lease)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn expired_lease_is_up_for_grabs() {
        let coord = MemoryCoordinator::new();
        let token = coord
            .try_acquire("scheduler_lock", Duration::from_millis(5))
            .await
            .unwrap();
        assert!(token.is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(coord
            .try_acquire("scheduler_lock", Duration::from_secs(60))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn ttl_cache_expires_reads() {
        let coord = MemoryCoordinator::new();
        coord
            .set_with_ttl("ingest:dummy:ts", "2024-01-01T00:00:00Z", Duration::from_millis(5))
            .await
            .unwrap();
        assert!(coord.get("ingest:dummy:ts").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(coord.get("ingest:dummy:ts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_token_does_not_release_a_newer_lease() {
        let coord = MemoryCoordinator::new();
        let stale = coord
            .try_acquire("scheduler_lock", Duration::from_millis(5))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fresh = coord
            .try_acquire("scheduler_lock", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(fresh.is_some());
        coord.release(stale).await.unwrap();
        // The new holder's lease must still stand.
        assert!(coord
            .try_acquire("scheduler_lock", Duration::from_secs(60))
            .await
            .unwrap()
            .is_none());
    }
}

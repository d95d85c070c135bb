// Lock Coordinator - best-effort cross-instance exclusion on an expiring key
//
// Locks are never released; they expire. The lock TTL must stay below the job
// interval so the next tick finds the previous key already gone.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Lock store unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically sets `key` to `value` with expiry `ttl` if the key is absent.
    /// Returns whether this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError>;
}

#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
}

impl RedisLockStore {
    pub async fn connect(redis_url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }
}

pub fn lock_key(name: &str) -> String {
    format!("lock:{}", name)
}

#[derive(Clone)]
pub struct LockCoordinator {
    store: Option<Arc<dyn LockStore>>,
    holder: String,
}

impl LockCoordinator {
    pub fn new(store: Option<Arc<dyn LockStore>>, holder: impl Into<String>) -> Self {
        Self {
            store,
            holder: holder.into(),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Tries to take `name` for `ttl`. Grants unconditionally when no store is
    /// configured and fails open when the store errors.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> bool {
        let Some(store) = &self.store else {
            return true;
        };

        match store.set_if_absent(&lock_key(name), &self.holder, ttl).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(job = name, holder = %self.holder, "Lock held by another instance");
                false
            }
            Err(e) => {
                warn!(job = name, "Lock store unavailable, proceeding without lock: {}", e);
                true
            }
        }
    }
}

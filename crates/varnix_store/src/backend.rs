//! Store backends.
//!
//! [`StoreBackend`] is the whole contract this crate has with the
//! external key-value store: get a blob, set a blob with an expiry the
//! store enforces on its own. There is no delete; entries only disappear
//! by expiring.

use std::future::Future;

use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::time::{Duration, Instant};
use tracing::info;

pub trait StoreBackend {
    fn get(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<Vec<u8>>>> + Send;

    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl_secs: u64,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

// =======================================================
// REDIS BACKEND
// =======================================================

/// Redis-backed store. `ConnectionManager` reconnects on its own and is
/// cheap to clone, one clone per in-flight command.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        info!(target: "varnix::store", %url, "Connected to redis store");
        Ok(Self { manager })
    }
}

impl StoreBackend for RedisStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }
}

// =======================================================
// MEMORY BACKEND
// =======================================================

struct StoredEntry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-process store with the same expiry semantics as the external one.
/// Expired entries read as absent and are dropped on access.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl StoreBackend for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.bytes.clone()));
            }
        }
        self.entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> anyhow::Result<()> {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                bytes: value.to_vec(),
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, StoreBackend};
    use tokio::time::{Duration, advance};

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryStore::new();
        store.set("k", b"value", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"value"[..]));
    }

    #[tokio::test]
    async fn memory_store_misses_on_absent_key() {
        let store = MemoryStore::new();
        assert!(store.get("absent").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn memory_store_expires_entries() {
        let store = MemoryStore::new();
        store.set("k", b"value", 30).await.unwrap();

        advance(Duration::from_secs(29)).await;
        assert!(store.get("k").await.unwrap().is_some());

        advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        // the expired entry is dropped, not just hidden
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn memory_store_overwrites_on_re_set() {
        let store = MemoryStore::new();
        store.set("k", b"old", 60).await.unwrap();
        store.set("k", b"new", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"new"[..]));
    }
}

use serde::Deserialize;

// =======================================================
// CACHE CONFIG
// =======================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL in seconds for stored responses. Required; there is no sane
    /// default, and a missing or zero value must abort startup.
    pub ttl_secs: Option<u64>,

    pub backend: StoreBackendKind,

    /// Redis connection URL (redis://host:port[/db]). Required when
    /// `backend = redis`.
    pub store_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: None,
            backend: StoreBackendKind::Redis,
            store_url: String::new(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_secs(&self) -> Option<u64> {
        self.ttl_secs
    }

    pub fn backend(&self) -> StoreBackendKind {
        self.backend
    }

    pub fn store_url(&self) -> &str {
        &self.store_url
    }
}

//! Keyed response store.
//!
//! [`key::cache_key`] maps a request URI to a deterministic, opaque store
//! key. [`backend::StoreBackend`] is the get/set-with-TTL contract over
//! the external key-value store (Redis in production, an in-process map
//! for tests and single-node setups). [`cache::ResponseCache`] layers the
//! fail-open policy on top: every store failure degrades to a cache miss.

pub mod backend;
pub mod cache;
pub mod key;

pub use backend::{MemoryStore, RedisStore, StoreBackend};
pub use cache::ResponseCache;
pub use key::cache_key;

//! Fail-open response cache.
//!
//! The store is a pure optimization layer: any failure against it (a
//! transport error, a blob that no longer parses) is logged and degrades
//! to a cache miss. Nothing in here can fail a request.

use tracing::{debug, error};
use varnix_http::wire::WireResponse;

use crate::backend::StoreBackend;
use crate::key::cache_key;

pub struct ResponseCache<S> {
    backend: S,
}

impl<S: StoreBackend> ResponseCache<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Look up the captured response for a request URI.
    ///
    /// Returns `None` for an absent key, for an unreachable store, and
    /// for a stored blob that fails to re-parse.
    pub async fn get(&self, uri: &str) -> Option<WireResponse> {
        let key = cache_key(uri);

        let bytes = match self.backend.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(target: "varnix::store", url = %uri, "Cache miss");
                return None;
            }
            Err(e) => {
                error!(
                    target: "varnix::store",
                    url = %uri,
                    error = ?e,
                    "Can't get response cache from store"
                );
                return None;
            }
        };

        match WireResponse::parse(&bytes) {
            Ok(res) => {
                debug!(
                    target: "varnix::store",
                    url = %uri,
                    status = res.status.as_u16(),
                    "Cache hit"
                );
                Some(res)
            }
            Err(e) => {
                error!(
                    target: "varnix::store",
                    url = %uri,
                    error = %e,
                    "Can't read stored response"
                );
                None
            }
        }
    }

    /// Persist already-serialized response wire bytes for a request URI.
    ///
    /// Overwrites any previous entry under the same key. Write failures
    /// are logged and swallowed; a failed capture must never abort the
    /// response that was already served.
    pub async fn set(&self, uri: &str, blob: &[u8], ttl_secs: u64) {
        if let Err(e) = self.backend.set(&cache_key(uri), blob, ttl_secs).await {
            error!(
                target: "varnix::store",
                url = %uri,
                error = ?e,
                "Can't write response to store"
            );
        }
    }
}

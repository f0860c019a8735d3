//! Server runtime.
//!
//! Binds the listener, runs a semaphore-bounded accept loop, and hands
//! each connection to a per-connection worker task that loops over
//! keep-alive requests and dispatches them to the caching handler.

use std::sync::Arc;

use tokio::sync::Semaphore;
use varnix_cache::CacheHandler;
use varnix_config::VarnixConfig;
use varnix_store::StoreBackend;

mod accept;
mod worker;

pub struct Server<S> {
    cfg: Arc<VarnixConfig>,
    handler: Arc<CacheHandler<S>>,
}

impl<S: StoreBackend + Send + Sync + 'static> Server<S> {
    pub fn new(cfg: VarnixConfig, handler: CacheHandler<S>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            handler: Arc::new(handler),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = accept::bind_listener(&self.cfg.server.listen).await?;
        let semaphore = Arc::new(Semaphore::new(self.cfg.global.max_connections as usize));
        accept::accept_loop(listener, self.cfg, self.handler, semaphore).await
    }
}

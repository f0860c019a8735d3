use tracing::warn;
use utils::init_tracing;
use varnix_cache::{CacheHandler, OriginClient};
use varnix_config::{StoreBackendKind, VarnixConfig};
use varnix_core::Server;
use varnix_store::{MemoryStore, RedisStore, ResponseCache, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = VarnixConfig::from_file("varnix.conf")
        .map_err(|e| anyhow::anyhow!("Error reading varnix.conf: {e}"))?;

    // A broken configuration (no TTL, no origin, bad listen address...)
    // must keep the process from coming up at all.
    let report = cfg.validate();
    if report.has_errors() {
        eprintln!("Invalid config in 'varnix.conf':");
        eprintln!("{}", report.format());
        anyhow::bail!("invalid configuration");
    }
    for warning in report.warnings() {
        warn!(target: "varnix", %warning, "Config warning");
    }

    cfg.print();

    match cfg.cache.backend {
        StoreBackendKind::Redis => {
            let store = RedisStore::connect(cfg.cache.store_url.as_str()).await?;
            run(cfg, store).await
        }
        StoreBackendKind::Memory => run(cfg, MemoryStore::new()).await,
    }
}

async fn run<S: StoreBackend + Send + Sync + 'static>(
    cfg: VarnixConfig,
    store: S,
) -> anyhow::Result<()> {
    let ttl_secs = cfg
        .cache
        .ttl_secs
        .ok_or_else(|| anyhow::anyhow!("cache.ttl_secs missing after validation"))?;

    let handler = CacheHandler::new(
        ResponseCache::new(store),
        OriginClient::new(&cfg.origin),
        ttl_secs,
    );

    Server::new(cfg, handler).run().await
}

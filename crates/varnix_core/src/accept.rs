use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use varnix_cache::CacheHandler;
use varnix_config::VarnixConfig;
use varnix_store::StoreBackend;

use crate::worker::handle_connection;

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    info!(target: "varnix::server", listen = %listen_addr, "Binding listener");

    match TcpListener::bind(listen_addr).await {
        Ok(listener) => {
            info!(target: "varnix::server", listen = %listen_addr, "Bind() successful");
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "varnix::server",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(e.into())
        }
    }
}

pub(crate) async fn accept_loop<S: StoreBackend + Send + Sync + 'static>(
    listener: TcpListener,
    cfg: Arc<VarnixConfig>,
    handler: Arc<CacheHandler<S>>,
    semaphore: Arc<Semaphore>,
) -> anyhow::Result<()> {
    info!(
        target: "varnix::server",
        max_connections = semaphore.available_permits(),
        "Accepting connections"
    );

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(target: "varnix::server", error = ?e, "Failed to accept connection");
                continue;
            }
        };

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(target: "varnix::server", error = ?e, "Failed to acquire connection permit");
                continue;
            }
        };

        debug!(
            target: "varnix::server",
            client_addr = %addr,
            available_permits = semaphore.available_permits(),
            "Connection accepted"
        );

        let cfg = cfg.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(Box::new(stream), addr, handler, cfg).await {
                debug!(
                    target: "varnix::worker",
                    client = %addr,
                    error = ?e,
                    "Connection ended with error"
                );
            }
            drop(permit);
        });
    }
}

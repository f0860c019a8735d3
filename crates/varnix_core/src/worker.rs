//! Per-connection worker.
//!
//! Reads client requests in a keep-alive loop and dispatches each one to
//! the caching handler. The handler decides whether the connection can be
//! kept open after the response.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::time::Duration;
use tracing::{debug, info, instrument};
use varnix_cache::CacheHandler;
use varnix_config::VarnixConfig;
use varnix_http::ClientStream;
use varnix_http::request::{RequestLimits, read_http_request};
use varnix_store::StoreBackend;

#[instrument(skip(stream, handler, cfg), fields(client = %client_addr))]
pub(crate) async fn handle_connection<S: StoreBackend>(
    mut stream: Box<dyn ClientStream>,
    client_addr: SocketAddr,
    handler: Arc<CacheHandler<S>>,
    cfg: Arc<VarnixConfig>,
) -> anyhow::Result<()> {
    info!(target: "varnix::worker", "Handling new client connection");

    let limits = RequestLimits {
        read_timeout: Duration::from_secs(cfg.server.client_read_timeout_secs),
        max_headers_bytes: cfg.server.max_request_headers_bytes as usize,
        max_body_bytes: cfg.server.max_request_body_bytes as usize,
    };
    let client_ip = client_addr.ip().to_string();

    let mut buf = BytesMut::new();
    let mut first_request = true;

    loop {
        let idle_timeout = if first_request {
            Duration::from_secs(cfg.server.client_read_timeout_secs)
        } else {
            Duration::from_secs(cfg.server.keepalive_timeout_secs)
        };

        let req = match read_http_request(&mut stream, &mut buf, &limits, idle_timeout).await? {
            Some(req) => req,
            None => break,
        };

        debug!(
            target: "varnix::worker",
            method = %req.method,
            path = %req.path,
            "Dispatching request"
        );

        let force_close = handler.serve(&mut stream, &req, &client_ip).await?;
        if force_close || req.close_after {
            break;
        }
        first_request = false;
    }

    debug!(target: "varnix::worker", "Finished handling connection");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::handle_connection;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use varnix_cache::{CacheHandler, OriginClient};
    use varnix_config::{OriginConfig, VarnixConfig};
    use varnix_store::{MemoryStore, ResponseCache};

    // Content-Length framed, no Connection header: the relayed response
    // leaves the client connection open for the next request.
    const OK_RESPONSE: &[u8] =
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nok";

    async fn spawn_origin() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut tmp = [0u8; 4096];
                    loop {
                        let n = stream.read(&mut tmp).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&tmp[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = stream.write_all(OK_RESPONSE).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (addr, hits)
    }

    async fn read_exactly(client: &mut tokio::io::DuplexStream, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        client.read_exact(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn keep_alive_connection_serves_miss_then_hit() {
        let (origin_addr, hits) = spawn_origin().await;

        let origin_cfg = OriginConfig {
            address: origin_addr.to_string(),
            ..OriginConfig::default()
        };
        let handler = Arc::new(CacheHandler::new(
            ResponseCache::new(MemoryStore::new()),
            OriginClient::new(&origin_cfg),
            60,
        ));
        let cfg = Arc::new(VarnixConfig::default());

        let (mut client, server) = tokio::io::duplex(1 << 20);
        let task = tokio::spawn(handle_connection(
            Box::new(server),
            "127.0.0.1:40000".parse().unwrap(),
            handler,
            cfg,
        ));

        client
            .write_all(b"GET /kv HTTP/1.1\r\nHost: frontend.test\r\n\r\n")
            .await
            .unwrap();
        let first = read_exactly(&mut client, OK_RESPONSE.len()).await;
        assert_eq!(first, OK_RESPONSE);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Same connection, same URI: replayed from the store.
        client
            .write_all(b"GET /kv HTTP/1.1\r\nHost: frontend.test\r\n\r\n")
            .await
            .unwrap();
        let second = read_exactly(&mut client, OK_RESPONSE.len()).await;
        assert_eq!(second, OK_RESPONSE);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(client);
        task.await.unwrap().unwrap();
    }
}

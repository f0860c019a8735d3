use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};
use varnix_http::ClientStream;
use varnix_http::request::ParsedRequest;
use varnix_http::responses::{send_500, send_500_message};
use varnix_http::wire::WireResponse;
use varnix_store::{ResponseCache, StoreBackend};

use crate::origin::OriginClient;

/// Read-through cache decision logic. Stateless across requests; each
/// request takes exactly one path: rejected, replayed from the store, or
/// forwarded to the origin and conditionally persisted.
pub struct CacheHandler<S> {
    cache: ResponseCache<S>,
    origin: OriginClient,
    ttl_secs: u64,
}

impl<S: StoreBackend> CacheHandler<S> {
    pub fn new(cache: ResponseCache<S>, origin: OriginClient, ttl_secs: u64) -> Self {
        Self {
            cache,
            origin,
            ttl_secs,
        }
    }

    /// Serve one request. Returns true when the client connection must
    /// close afterwards.
    #[instrument(skip(self, stream, req, client_ip), fields(method = %req.method, uri = %req.path))]
    pub async fn serve(
        &self,
        stream: &mut dyn ClientStream,
        req: &ParsedRequest,
        client_ip: &str,
    ) -> anyhow::Result<bool> {
        // Only GET is cache-eligible; everything else is refused outright
        // without touching the store or the origin.
        if req.method != "GET" {
            error!(
                target: "varnix::cache",
                url = %req.path,
                method = %req.method,
                "Can't cache non-GET method"
            );
            send_500(stream).await?;
            return Ok(true);
        }

        if let Some(cached) = self.cache.get(&req.path).await {
            return replay(stream, &cached).await;
        }

        self.forward_and_store(stream, req, client_ip).await
    }

    async fn forward_and_store(
        &self,
        stream: &mut dyn ClientStream,
        req: &ParsedRequest,
        client_ip: &str,
    ) -> anyhow::Result<bool> {
        let res = match self.origin.forward(req, client_ip).await {
            Ok(res) => res,
            Err(e) => {
                error!(
                    target: "varnix::cache",
                    url = %req.path,
                    error = ?e,
                    "Origin request failed"
                );
                send_500_message(stream, &e.to_string()).await?;
                return Ok(true);
            }
        };

        // A client that went away must not stop the capture from being
        // stored, so the write result is checked only after the store
        // decision.
        let write_result = write_all_flush(stream, &res.bytes).await;
        if let Err(e) = &write_result {
            debug!(
                target: "varnix::cache",
                url = %req.path,
                error = ?e,
                "Client write failed; response is discarded client-side"
            );
        }

        // Only unambiguous success responses are worth keeping; redirects,
        // client errors and transient server errors pass through uncached.
        if res.status.is_success() {
            self.cache.set(&req.path, &res.bytes, self.ttl_secs).await;
        } else {
            debug!(
                target: "varnix::cache",
                url = %req.path,
                status = res.status.as_u16(),
                "Skipping store for non-success status"
            );
        }

        if write_result.is_err() {
            return Ok(true);
        }
        Ok(!res.framed)
    }
}

async fn write_all_flush(stream: &mut dyn ClientStream, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await
}

/// Write a stored capture back to the client, re-serialized from the
/// parsed form. No TTL refresh happens on read.
async fn replay(stream: &mut dyn ClientStream, cached: &WireResponse) -> anyhow::Result<bool> {
    debug!(
        target: "varnix::cache",
        status = cached.status.as_u16(),
        body_len = cached.body.len(),
        "Replaying stored response"
    );

    stream.write_all(&cached.to_bytes()).await?;
    stream.flush().await?;

    let keep_alive = cached.content_length().is_some() && !cached.declares_close();
    Ok(!keep_alive)
}

//! Origin transport client.
//!
//! One fresh TCP round-trip per forwarded request: connect, write the
//! rewritten request, read the whole response into one owned buffer. The
//! forwarded request always carries `Connection: close`, so read-to-EOF
//! is a safe fallback whenever the response is not Content-Length framed.
//!
//! The capture kept in [`OriginResponse::bytes`] is the exact wire image
//! of what the origin sent; it is written to the client as-is and, for
//! success statuses, handed to the store as-is.

use http::StatusCode;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{Duration, timeout},
};
use tracing::{debug, instrument, warn};
use varnix_config::OriginConfig;
use varnix_http::request::ParsedRequest;

pub struct OriginClient {
    address: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    max_response_headers: usize,
    max_response_body: usize,
}

/// A buffered origin response.
pub struct OriginResponse {
    pub status: StatusCode,
    /// Full wire capture: status line + headers + CRLF + body.
    pub bytes: Vec<u8>,
    /// Content-Length framed and not asking to close. Decides whether the
    /// client connection can stay open after the bytes are relayed.
    pub framed: bool,
}

impl OriginClient {
    pub fn new(cfg: &OriginConfig) -> Self {
        Self {
            address: cfg.address.clone(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            read_timeout: Duration::from_secs(cfg.read_timeout_secs),
            write_timeout: Duration::from_secs(cfg.write_timeout_secs),
            max_response_headers: cfg.max_response_headers_bytes as usize,
            max_response_body: cfg.max_response_body_bytes as usize,
        }
    }

    /// Forward a request to the origin and buffer the full response.
    #[instrument(skip(self, req, client_ip), fields(origin = %self.address, path = %req.path))]
    pub async fn forward(
        &self,
        req: &ParsedRequest,
        client_ip: &str,
    ) -> anyhow::Result<OriginResponse> {
        let mut out = Vec::new();
        let start_line = format!("{} {} {}\r\n", req.method, req.path, req.http_version);
        out.extend_from_slice(start_line.as_bytes());
        out.extend_from_slice(
            rewrite_origin_headers(&req.headers, &self.address, client_ip, req.body.len())
                .as_bytes(),
        );
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&req.body);

        let mut stream =
            match timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
                Ok(res) => res?,
                Err(_) => anyhow::bail!("origin connect timeout to {}", self.address),
            };

        debug!(
            target: "varnix::origin",
            method = %req.method,
            path = %req.path,
            "Forwarding request to origin"
        );

        match timeout(self.write_timeout, stream.write_all(&out)).await {
            Ok(res) => res?,
            Err(_) => anyhow::bail!("origin write timeout to {}", self.address),
        }

        self.read_response(&mut stream).await
    }

    /// Read one full HTTP response from the origin:
    /// - reads until `\r\n\r\n`, then parses status and framing headers
    /// - Content-Length: reads exactly that many body bytes
    /// - chunked or no length: reads to EOF, capturing the framing as-is
    async fn read_response(&self, stream: &mut TcpStream) -> anyhow::Result<OriginResponse> {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];

        let headers_end = loop {
            let n = match timeout(self.read_timeout, stream.read(&mut tmp)).await {
                Ok(res) => res?,
                Err(_) => anyhow::bail!("origin read timeout"),
            };
            if n == 0 {
                if buf.is_empty() {
                    anyhow::bail!("origin closed the connection without a response");
                }
                anyhow::bail!("origin closed the connection while sending headers");
            }
            buf.extend_from_slice(&tmp[..n]);

            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }

            if self.max_response_headers > 0 && buf.len() > self.max_response_headers {
                anyhow::bail!("origin response headers too large");
            }
        };

        let meta = parse_response_metadata(&buf[..headers_end])?;
        let body_start = headers_end + 4;

        if let (Some(cl), false) = (meta.content_length, meta.is_chunked) {
            if self.max_response_body > 0 && cl > self.max_response_body {
                anyhow::bail!("origin response body too large");
            }

            while buf.len() - body_start < cl {
                let n = match timeout(self.read_timeout, stream.read(&mut tmp)).await {
                    Ok(res) => res?,
                    Err(_) => anyhow::bail!("origin read timeout"),
                };
                if n == 0 {
                    warn!(
                        target: "varnix::origin",
                        expected = cl,
                        got = buf.len() - body_start,
                        "Origin closed before the full body was read"
                    );
                    break;
                }
                let remaining = cl - (buf.len() - body_start);
                buf.extend_from_slice(&tmp[..n.min(remaining)]);
            }

            return Ok(OriginResponse {
                status: meta.status,
                bytes: buf,
                framed: !meta.declares_close,
            });
        }

        // Chunked or length-less: the origin will close (we asked it to),
        // so capture everything up to EOF, framing included.
        loop {
            let n = match timeout(self.read_timeout, stream.read(&mut tmp)).await {
                Ok(res) => res?,
                Err(_) => anyhow::bail!("origin read timeout"),
            };
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            if self.max_response_body > 0 && buf.len() - body_start > self.max_response_body {
                anyhow::bail!("origin response body too large");
            }
        }

        Ok(OriginResponse {
            status: meta.status,
            bytes: buf,
            framed: false,
        })
    }
}

struct ResponseMetadata {
    status: StatusCode,
    content_length: Option<usize>,
    declares_close: bool,
    is_chunked: bool,
}

fn parse_response_metadata(header_bytes: &[u8]) -> anyhow::Result<ResponseMetadata> {
    let header_str = String::from_utf8_lossy(header_bytes);
    let mut lines = header_str.lines();

    let status_line = lines.next().unwrap_or("");
    let code = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| anyhow::anyhow!("malformed origin status line: {status_line:?}"))?;
    let status = StatusCode::from_u16(code)
        .map_err(|_| anyhow::anyhow!("invalid origin status code {code}"))?;

    let mut content_length = None;
    let mut declares_close = false;
    let mut is_chunked = false;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => {
                if let Ok(len) = value.parse::<usize>() {
                    content_length = Some(len);
                }
            }
            "connection" => {
                if value
                    .split(',')
                    .any(|t| t.trim().eq_ignore_ascii_case("close"))
                {
                    declares_close = true;
                }
            }
            "transfer-encoding" => {
                if value
                    .split(',')
                    .any(|t| t.trim().eq_ignore_ascii_case("chunked"))
                {
                    is_chunked = true;
                }
            }
            _ => {}
        }
    }

    Ok(ResponseMetadata {
        status,
        content_length,
        declares_close,
        is_chunked,
    })
}

/// Rewrite the client's header block for the origin:
/// - `Host` becomes the origin authority (the original goes to
///   `X-Forwarded-Host`)
/// - hop-by-hop and stale `X-Forwarded-*` headers are dropped
/// - `X-Forwarded-For` / `X-Real-IP` / `X-Forwarded-Proto` are appended
/// - `Connection: close` is forced, and `Content-Length` is recomputed
///   from the buffered body
fn rewrite_origin_headers(
    req_headers: &str,
    origin_authority: &str,
    client_ip: &str,
    body_len: usize,
) -> String {
    let connection_tokens = collect_connection_tokens(req_headers);
    let mut lines = req_headers.lines();
    let _ = lines.next(); // request line

    let mut headers: Vec<(String, String)> = Vec::new();
    headers.push(("Host".to_string(), origin_authority.to_string()));

    let mut host_value: Option<String> = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        let name_lower = name.to_ascii_lowercase();

        if name_lower == "host" {
            host_value = Some(value.to_string());
            continue;
        }

        // Stale forwarded headers from an earlier hop.
        if matches!(
            name_lower.as_str(),
            "x-forwarded-for" | "x-real-ip" | "x-forwarded-proto" | "x-forwarded-host"
        ) {
            continue;
        }

        // Hop-by-hop headers must not cross a proxy hop.
        if matches!(
            name_lower.as_str(),
            "connection"
                | "keep-alive"
                | "proxy-connection"
                | "te"
                | "trailer"
                | "transfer-encoding"
                | "upgrade"
                | "content-length"
        ) {
            continue;
        }

        if connection_tokens.contains(&name_lower) {
            continue;
        }

        headers.push((name.to_string(), value.to_string()));
    }

    headers.push(("X-Forwarded-For".to_string(), client_ip.to_string()));
    headers.push(("X-Real-IP".to_string(), client_ip.to_string()));
    headers.push(("X-Forwarded-Proto".to_string(), "http".to_string()));
    if let Some(host) = host_value {
        headers.push(("X-Forwarded-Host".to_string(), host));
    }

    headers.push(("Connection".to_string(), "close".to_string()));
    if body_len > 0 {
        headers.push(("Content-Length".to_string(), body_len.to_string()));
    }

    let mut out = String::new();
    for (name, value) in headers {
        out.push_str(&name);
        out.push_str(": ");
        out.push_str(&value);
        out.push_str("\r\n");
    }
    out
}

fn collect_connection_tokens(req_headers: &str) -> std::collections::HashSet<String> {
    let mut tokens = std::collections::HashSet::new();
    for line in req_headers.lines().skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("connection") {
            continue;
        }
        for token in value.split(',') {
            let trimmed = token.trim().trim_matches(|c| c == '"' || c == '\'');
            if !trimmed.is_empty() {
                tokens.insert(trimmed.to_ascii_lowercase());
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::{parse_response_metadata, rewrite_origin_headers};

    #[test]
    fn rewrite_replaces_host_and_forces_close() {
        let req = "GET /a HTTP/1.1\r\nHost: cdn.example\r\nAccept: */*";
        let out = rewrite_origin_headers(req, "origin.internal:9000", "10.0.0.9", 0);
        assert!(out.starts_with("Host: origin.internal:9000\r\n"));
        assert!(out.contains("\r\nAccept: */*\r\n"));
        assert!(out.contains("\r\nX-Forwarded-Host: cdn.example\r\n"));
        assert!(out.contains("\r\nX-Forwarded-For: 10.0.0.9\r\n"));
        assert!(out.contains("\r\nConnection: close\r\n"));
        assert!(!out.contains("Content-Length"));
    }

    #[test]
    fn rewrite_drops_connection_token_headers() {
        let req = "GET / HTTP/1.1\r\nHost: example\r\nConnection: \"Foo\", keep-alive\r\nFoo: bar\r\nX-Test: ok";
        let out = rewrite_origin_headers(req, "origin:9000", "127.0.0.1", 0);
        assert!(!out.contains("\r\nFoo:"));
        assert!(out.contains("\r\nX-Test: ok\r\n"));
    }

    #[test]
    fn rewrite_recomputes_content_length() {
        let req = "POST /u HTTP/1.1\r\nHost: example\r\nContent-Length: 999\r\nTransfer-Encoding: chunked";
        let out = rewrite_origin_headers(req, "origin:9000", "127.0.0.1", 11);
        assert!(out.contains("\r\nContent-Length: 11\r\n"));
        assert!(!out.contains("999"));
        assert!(!out.contains("Transfer-Encoding"));
    }

    #[test]
    fn response_metadata_parses_status_and_framing() {
        let raw = b"HTTP/1.1 204 No Content\r\nConnection: close\r\nContent-Length: 0";
        let meta = parse_response_metadata(raw).expect("expected ok");
        assert_eq!(meta.status.as_u16(), 204);
        assert_eq!(meta.content_length, Some(0));
        assert!(meta.declares_close);
        assert!(!meta.is_chunked);
    }

    #[test]
    fn response_metadata_rejects_garbage_status_lines() {
        assert!(parse_response_metadata(b"garbage in, garbage out").is_err());
    }
}

//! Inbound request reading.
//!
//! Reads one full HTTP/1.1 request from a client connection:
//! - reads until `\r\n\r\n` (end of headers) under idle/read timeouts
//! - parses the request line and the framing-relevant headers
//! - materializes the whole body into an owned buffer (Content-Length or
//!   chunked), so downstream code never touches the transport again
//!
//! Protocol violations answer with a canned 400/408/413/431 and yield
//! `None`, which callers treat as "close this connection".

use bytes::{Buf, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

use crate::ClientStream;
use crate::responses::{send_400, send_408, send_413, send_431};

#[derive(Debug)]
pub struct ParsedRequest {
    /// Raw header block: request line + headers, CRLF separated, without
    /// the terminating blank line.
    pub headers: String,
    pub method: String,
    /// Request URI: path plus query string, exactly as received.
    pub path: String,
    pub http_version: String,
    pub close_after: bool,
    pub body: Vec<u8>,
}

/// Transport ceilings for one request read.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub read_timeout: Duration,
    pub max_headers_bytes: usize,
    pub max_body_bytes: usize,
}

pub async fn read_http_request(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    limits: &RequestLimits,
    idle_timeout: Duration,
) -> anyhow::Result<Option<ParsedRequest>> {
    let headers_end = loop {
        if let Some(pos) = find_headers_end(buf) {
            break pos;
        }

        if limits.max_headers_bytes > 0 && buf.len() > limits.max_headers_bytes {
            send_431(stream).await?;
            return Ok(None);
        }

        let timeout_dur = if buf.is_empty() {
            idle_timeout
        } else {
            limits.read_timeout
        };
        match read_more(stream, buf, timeout_dur).await? {
            ReadOutcome::Timeout => {
                if buf.is_empty() {
                    return Ok(None);
                }
                send_408(stream).await?;
                return Ok(None);
            }
            ReadOutcome::Read(0) => return Ok(None),
            ReadOutcome::Read(_) => {}
        }
    };

    let headers = String::from_utf8_lossy(&buf[..headers_end]).to_string();
    buf.advance(headers_end + 4);

    let meta = match parse_request_metadata(&headers) {
        Ok(meta) => meta,
        Err(err) => {
            warn!(target: "varnix::http", error = ?err, "Invalid request headers");
            send_400(stream).await?;
            return Ok(None);
        }
    };

    let mut content_length = meta.content_length;
    if meta.is_chunked && content_length > 0 {
        warn!(
            target: "varnix::http",
            content_length,
            "Ignoring Content-Length because Transfer-Encoding is chunked"
        );
        content_length = 0;
    }

    let body = if meta.is_chunked {
        match read_chunked_body(stream, buf, limits.read_timeout, limits.max_body_bytes).await? {
            BodyRead::Done(body) => body,
            BodyRead::Timeout => {
                send_408(stream).await?;
                return Ok(None);
            }
            BodyRead::TooLarge => {
                send_413(stream).await?;
                return Ok(None);
            }
            BodyRead::Invalid => {
                send_400(stream).await?;
                return Ok(None);
            }
            BodyRead::Closed => return Ok(None),
        }
    } else if content_length > 0 {
        if limits.max_body_bytes > 0 && content_length > limits.max_body_bytes {
            send_413(stream).await?;
            return Ok(None);
        }
        match read_sized_body(stream, buf, content_length, limits.read_timeout).await? {
            BodyRead::Done(body) => body,
            BodyRead::Timeout => {
                send_408(stream).await?;
                return Ok(None);
            }
            BodyRead::Closed => return Ok(None),
            BodyRead::TooLarge | BodyRead::Invalid => {
                send_400(stream).await?;
                return Ok(None);
            }
        }
    } else {
        Vec::new()
    };

    debug!(
        target: "varnix::http",
        method = %meta.method,
        path = %meta.path,
        body_len = body.len(),
        "Read HTTP request"
    );

    Ok(Some(ParsedRequest {
        headers,
        method: meta.method,
        path: meta.path,
        http_version: meta.http_version,
        close_after: meta.close_after,
        body,
    }))
}

enum ReadOutcome {
    Read(usize),
    Timeout,
}

async fn read_more(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    timeout_dur: Duration,
) -> anyhow::Result<ReadOutcome> {
    let mut tmp = [0u8; 4096];
    match timeout(timeout_dur, stream.read(&mut tmp)).await {
        Ok(res) => {
            let n = res?;
            if n > 0 {
                buf.extend_from_slice(&tmp[..n]);
            }
            Ok(ReadOutcome::Read(n))
        }
        Err(_) => Ok(ReadOutcome::Timeout),
    }
}

fn find_headers_end(buf: &BytesMut) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

// =======================================================
// BODY READING
// =======================================================

enum BodyRead {
    Done(Vec<u8>),
    Timeout,
    Closed,
    TooLarge,
    Invalid,
}

enum LineRead {
    Line(Vec<u8>),
    Timeout,
    Closed,
}

async fn read_sized_body(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    len: usize,
    read_timeout: Duration,
) -> anyhow::Result<BodyRead> {
    let mut body = Vec::with_capacity(len);
    while body.len() < len {
        if !buf.is_empty() {
            let take = (len - body.len()).min(buf.len());
            body.extend_from_slice(&buf[..take]);
            buf.advance(take);
            continue;
        }
        match read_more(stream, buf, read_timeout).await? {
            ReadOutcome::Timeout => return Ok(BodyRead::Timeout),
            ReadOutcome::Read(0) => return Ok(BodyRead::Closed),
            ReadOutcome::Read(_) => {}
        }
    }
    Ok(BodyRead::Done(body))
}

/// Reads a chunked body and returns it decoded (framing stripped).
async fn read_chunked_body(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    read_timeout: Duration,
    max_body: usize,
) -> anyhow::Result<BodyRead> {
    let mut body = Vec::new();

    loop {
        let line = match read_line(stream, buf, read_timeout).await? {
            LineRead::Line(line) => line,
            LineRead::Timeout => return Ok(BodyRead::Timeout),
            LineRead::Closed => return Ok(BodyRead::Closed),
        };

        let size_str = match std::str::from_utf8(&line[..line.len() - 2]) {
            Ok(s) => s.split(';').next().unwrap_or("").trim(),
            Err(_) => return Ok(BodyRead::Invalid),
        };
        let Ok(chunk_size) = usize::from_str_radix(size_str, 16) else {
            return Ok(BodyRead::Invalid);
        };

        if chunk_size == 0 {
            // Trailer section ends at the first empty line.
            loop {
                match read_line(stream, buf, read_timeout).await? {
                    LineRead::Line(trailer) => {
                        if trailer == b"\r\n" {
                            return Ok(BodyRead::Done(body));
                        }
                    }
                    LineRead::Timeout => return Ok(BodyRead::Timeout),
                    LineRead::Closed => return Ok(BodyRead::Closed),
                }
            }
        }

        if max_body > 0 && body.len() + chunk_size > max_body {
            return Ok(BodyRead::TooLarge);
        }

        // chunk data + trailing CRLF
        match read_sized_body(stream, buf, chunk_size + 2, read_timeout).await? {
            BodyRead::Done(mut chunk) => {
                chunk.truncate(chunk_size);
                body.extend_from_slice(&chunk);
            }
            other => return Ok(other),
        }
    }
}

async fn read_line(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    read_timeout: Duration,
) -> anyhow::Result<LineRead> {
    loop {
        if let Some(end) = find_crlf(buf) {
            let line = buf.split_to(end + 2);
            return Ok(LineRead::Line(line.to_vec()));
        }
        match read_more(stream, buf, read_timeout).await? {
            ReadOutcome::Timeout => return Ok(LineRead::Timeout),
            ReadOutcome::Read(0) => return Ok(LineRead::Closed),
            ReadOutcome::Read(_) => {}
        }
    }
}

fn find_crlf(buf: &BytesMut) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

// =======================================================
// REQUEST LINE + HEADER METADATA
// =======================================================

#[derive(Debug)]
struct RequestMetadata {
    method: String,
    path: String,
    http_version: String,
    content_length: usize,
    close_after: bool,
    is_chunked: bool,
}

#[derive(Debug, PartialEq)]
enum MetadataError {
    BadContentLength,
}

fn parse_request_metadata(headers: &str) -> Result<RequestMetadata, MetadataError> {
    let mut lines = headers.lines();
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("-").to_string();
    let path = parts.next().unwrap_or("/").to_string();
    let http_version = parts.next().unwrap_or("HTTP/1.1").to_string();

    let mut content_length: Option<usize> = None;
    let mut bad_length = false;
    let mut connection_close = false;
    let mut connection_keep_alive = false;
    let mut is_chunked = false;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => {
                if value.is_empty() {
                    bad_length = true;
                    continue;
                }
                // Repeated or comma-joined values must all agree.
                for part in value.split(',') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    match part.parse::<usize>() {
                        Ok(len) => match content_length {
                            Some(prev) if prev != len => bad_length = true,
                            _ => content_length = Some(len),
                        },
                        Err(_) => bad_length = true,
                    }
                }
            }
            "connection" | "proxy-connection" => {
                for token in split_header_tokens(value) {
                    match token.as_str() {
                        "close" => connection_close = true,
                        "keep-alive" => connection_keep_alive = true,
                        _ => {}
                    }
                }
            }
            "transfer-encoding" => {
                for token in split_header_tokens(value) {
                    if token == "chunked" {
                        is_chunked = true;
                    }
                }
            }
            _ => {}
        }
    }

    if bad_length {
        return Err(MetadataError::BadContentLength);
    }

    let close_after = if http_version == "HTTP/1.0" {
        !connection_keep_alive || connection_close
    } else {
        connection_close
    };

    Ok(RequestMetadata {
        method,
        path,
        http_version,
        content_length: content_length.unwrap_or(0),
        close_after,
        is_chunked,
    })
}

fn split_header_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').filter_map(|token| {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(
                trimmed
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_ascii_lowercase(),
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{MetadataError, ParsedRequest, RequestLimits, parse_request_metadata, read_http_request};
    use bytes::BytesMut;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::Duration;

    fn limits() -> RequestLimits {
        RequestLimits {
            read_timeout: Duration::from_secs(5),
            max_headers_bytes: 64 * 1024,
            max_body_bytes: 1024 * 1024,
        }
    }

    async fn read_from_bytes(raw: &[u8]) -> anyhow::Result<Option<ParsedRequest>> {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        client.write_all(raw).await?;
        drop(client);
        let mut buf = BytesMut::new();
        read_http_request(&mut server, &mut buf, &limits(), Duration::from_secs(5)).await
    }

    #[tokio::test]
    async fn reads_a_simple_get() {
        let req = read_from_bytes(b"GET /a/b?x=1 HTTP/1.1\r\nHost: example\r\n\r\n")
            .await
            .expect("expected ok")
            .expect("expected a request");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/a/b?x=1");
        assert_eq!(req.http_version, "HTTP/1.1");
        assert!(!req.close_after);
        assert!(req.body.is_empty());
    }

    #[tokio::test]
    async fn reads_a_sized_body() {
        let req = read_from_bytes(
            b"POST /upload HTTP/1.1\r\nHost: example\r\nContent-Length: 5\r\n\r\nhello",
        )
        .await
        .expect("expected ok")
        .expect("expected a request");
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn decodes_a_chunked_body() {
        let req = read_from_bytes(
            b"POST /upload HTTP/1.1\r\nHost: example\r\nTransfer-Encoding: chunked\r\n\r\n\
              5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        )
        .await
        .expect("expected ok")
        .expect("expected a request");
        assert_eq!(req.body, b"hello world");
    }

    #[tokio::test]
    async fn conflicting_content_length_answers_400() {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        client
            .write_all(b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n")
            .await
            .unwrap();
        let mut buf = BytesMut::new();
        let req = read_http_request(&mut server, &mut buf, &limits(), Duration::from_secs(5))
            .await
            .expect("expected ok");
        assert!(req.is_none());

        let mut out = vec![0u8; 1024];
        let n = client.read(&mut out).await.unwrap();
        assert!(out[..n].starts_with(b"HTTP/1.1 400"));
    }

    #[test]
    fn parse_request_metadata_rejects_conflicting_content_length() {
        let headers = "POST /upload HTTP/1.1\r\nHost: example\r\nContent-Length: 5\r\nContent-Length: 6";
        let err = parse_request_metadata(headers).unwrap_err();
        assert_eq!(err, MetadataError::BadContentLength);
    }

    #[test]
    fn parse_request_metadata_accepts_duplicate_content_length() {
        let headers = "POST /upload HTTP/1.1\r\nHost: example\r\nContent-Length: 5\r\nContent-Length: 5";
        let meta = parse_request_metadata(headers).expect("expected ok");
        assert_eq!(meta.content_length, 5);
    }

    #[test]
    fn parse_request_metadata_connection_tokens() {
        let headers = "GET / HTTP/1.1\r\nConnection: \"keep-alive\", close";
        let meta = parse_request_metadata(headers).expect("expected ok");
        assert!(meta.close_after);
    }

    #[test]
    fn http10_without_keep_alive_closes() {
        let headers = "GET / HTTP/1.0\r\nHost: example";
        let meta = parse_request_metadata(headers).expect("expected ok");
        assert!(meta.close_after);
    }
}

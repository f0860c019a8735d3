//! Response wire capture.
//!
//! A [`WireResponse`] is an exact capture of an HTTP/1.x response message:
//! status line, every header in original order and multiplicity, and the
//! full body. Its serialized form is the raw response wire format (status
//! line + headers + CRLF + body), so a stored blob is self-describing and
//! can be re-parsed without any extra framing.

use http::StatusCode;

/// Upper bound on headers accepted when re-parsing a stored blob.
const MAX_HEADERS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("header section is incomplete")]
    Truncated,

    #[error("malformed response: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("status line carries no status code")]
    MissingStatus,

    #[error("invalid status code {0}")]
    InvalidStatus(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// Minor HTTP version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    pub version_minor: u8,
    pub status: StatusCode,
    pub reason: String,
    /// Headers in wire order; repeated names keep their multiplicity.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WireResponse {
    /// Parse a full response message from its wire bytes.
    ///
    /// `bytes` must contain the complete message: everything after the
    /// header terminator is taken as the body.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        let mut header_buf = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut header_buf);

        let body_start = match parsed.parse(bytes)? {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => return Err(WireError::Truncated),
        };

        let code = parsed.code.ok_or(WireError::MissingStatus)?;
        let status = StatusCode::from_u16(code).map_err(|_| WireError::InvalidStatus(code))?;

        let headers = parsed
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect();

        Ok(Self {
            version_minor: parsed.version.unwrap_or(1),
            status,
            reason: parsed.reason.unwrap_or("").to_string(),
            headers,
            body: bytes[body_start..].to_vec(),
        })
    }

    /// Serialize back to the raw wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let status_line = format!(
            "HTTP/1.{} {} {}\r\n",
            self.version_minor,
            self.status.as_u16(),
            self.reason
        );

        let mut out = Vec::with_capacity(status_line.len() + self.body.len() + 128);
        out.extend_from_slice(status_line.as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// First value of a header, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared Content-Length, when present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// True when the message asks for the connection to be closed.
    pub fn declares_close(&self) -> bool {
        self.header("connection")
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("close")))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{WireError, WireResponse};
    use http::StatusCode;

    #[test]
    fn parse_extracts_status_headers_and_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let res = WireResponse::parse(raw).expect("expected ok");
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.reason, "OK");
        assert_eq!(res.version_minor, 1);
        assert_eq!(res.header("content-type"), Some("text/plain"));
        assert_eq!(res.content_length(), Some(5));
        assert_eq!(res.body, b"hello");
    }

    #[test]
    fn duplicate_headers_keep_order_and_multiplicity() {
        let raw = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nX-Other: x\r\nSet-Cookie: b=2\r\n\r\n";
        let res = WireResponse::parse(raw).expect("expected ok");
        let cookies: Vec<&str> = res
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn round_trip_preserves_everything() {
        let res = WireResponse {
            version_minor: 1,
            status: StatusCode::CREATED,
            reason: "Created".into(),
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("Set-Cookie".into(), "a=1".into()),
                ("Set-Cookie".into(), "b=2".into()),
                ("Content-Length".into(), "2".into()),
            ],
            body: b"{}".to_vec(),
        };
        let parsed = WireResponse::parse(&res.to_bytes()).expect("expected ok");
        assert_eq!(parsed, res);
    }

    #[test]
    fn round_trip_is_byte_stable() {
        let raw = b"HTTP/1.0 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found";
        let res = WireResponse::parse(raw).expect("expected ok");
        assert_eq!(res.to_bytes(), raw.to_vec());
    }

    #[test]
    fn truncated_header_section_is_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n";
        assert!(matches!(
            WireResponse::parse(raw),
            Err(WireError::Truncated)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(WireResponse::parse(b"not an http response at all").is_err());
    }

    #[test]
    fn declares_close_matches_token_lists() {
        let raw = b"HTTP/1.1 200 OK\r\nConnection: keep-alive, Close\r\n\r\n";
        let res = WireResponse::parse(raw).expect("expected ok");
        assert!(res.declares_close());
    }
}

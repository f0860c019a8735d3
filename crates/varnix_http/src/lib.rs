//! HTTP/1.1 wire layer.
//!
//! Inbound request reading ([`request`]), canned error responses
//! ([`responses`]), and the response wire capture type ([`wire`]) whose
//! serialized form is exactly what gets persisted in the store.

use tokio::io::{AsyncRead, AsyncWrite};

pub mod request;
pub mod responses;
pub mod wire;

pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

use uuid::Uuid;

const KEY_PREFIX: &str = "varnix";

/// Derive the store key for a request URI (path plus query string).
///
/// The key is a UUIDv5 (SHA-1 content hash under the URL namespace) of the
/// URI bytes, prefixed with a fixed namespace tag. Identical URIs always
/// map to the same key; the key carries no way back to the URI.
pub fn cache_key(uri: &str) -> String {
    format!(
        "{}:{}",
        KEY_PREFIX,
        Uuid::new_v5(&Uuid::NAMESPACE_URL, uri.as_bytes())
    )
}

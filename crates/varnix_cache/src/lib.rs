//! Read-through caching handler.
//!
//! One pass per request: validate the method, consult the store, replay a
//! stored capture or forward to the origin, then persist successful
//! responses. The handler owns the observable HTTP behavior of the whole
//! system; the store is only ever an optimization.

mod handler;
mod origin;

pub use handler::CacheHandler;
pub use origin::{OriginClient, OriginResponse};

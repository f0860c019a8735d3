//! Configuration models for varnix.
//!
//! Loaded from `varnix.conf` (INI) via the `config` crate into serde
//! models with defaults. `validate()` produces a [`ConfigReport`]; errors
//! in the report must abort startup (most notably a missing or zero cache
//! TTL).

mod cache;
mod global;
mod origin;
mod server;
mod validation;
mod varnix;

pub use cache::{CacheConfig, StoreBackendKind};
pub use global::GlobalConfig;
pub use origin::OriginConfig;
pub use server::ServerConfig;
pub use validation::{ConfigReport, validate};
pub use varnix::VarnixConfig;

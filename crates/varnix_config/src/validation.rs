use std::net::SocketAddr;

use crate::{StoreBackendKind, VarnixConfig};

/// Validation output for a loaded varnix configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a varnix configuration and return a report of issues.
pub fn validate(cfg: &VarnixConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_server(cfg, &mut report);
    validate_origin(cfg, &mut report);
    validate_cache(cfg, &mut report);

    report
}

fn validate_server(cfg: &VarnixConfig, report: &mut ConfigReport) {
    if cfg.server.listen.parse::<SocketAddr>().is_err() {
        report.error(format!(
            "server.listen '{}' is not a valid socket address",
            cfg.server.listen
        ));
    }

    if cfg.server.max_request_body_bytes == 0 {
        report.warn("server.max_request_body_bytes is 0; request bodies are unbounded");
    }
}

fn validate_origin(cfg: &VarnixConfig, report: &mut ConfigReport) {
    let address = cfg.origin.address.trim();
    if address.is_empty() {
        report.error("origin.address is empty; there is no upstream to forward misses to");
        return;
    }

    // host:port, hostname allowed (resolved at connect time).
    if !address.contains(':') || address.contains("://") {
        report.error(format!(
            "origin.address '{address}' must be host:port, without a scheme"
        ));
    }

    if cfg.origin.max_response_body_bytes == 0 {
        report.warn("origin.max_response_body_bytes is 0; buffered response bodies are unbounded");
    }
}

fn validate_cache(cfg: &VarnixConfig, report: &mut ConfigReport) {
    // A handler without a usable TTL must not come up at all.
    match cfg.cache.ttl_secs {
        None => report.error("cache.ttl_secs is required and was not set"),
        Some(0) => report.error("cache.ttl_secs is 0; stored responses would expire immediately"),
        Some(_) => {}
    }

    if cfg.cache.backend == StoreBackendKind::Redis {
        let url = cfg.cache.store_url.trim();
        if url.is_empty() {
            report.error("cache.store_url is required for the redis backend");
        } else if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            report.error(format!(
                "cache.store_url '{url}' is not a redis:// connection URL"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{StoreBackendKind, VarnixConfig};

    fn valid_config() -> VarnixConfig {
        let mut cfg = VarnixConfig::default();
        cfg.origin.address = "127.0.0.1:9000".into();
        cfg.cache.ttl_secs = Some(60);
        cfg.cache.store_url = "redis://127.0.0.1:6379".into();
        cfg
    }

    #[test]
    fn valid_config_passes() {
        let report = valid_config().validate();
        assert!(report.is_ok(), "unexpected errors: {}", report.format());
    }

    #[test]
    fn missing_ttl_is_an_error() {
        let mut cfg = valid_config();
        cfg.cache.ttl_secs = None;
        let report = cfg.validate();
        assert!(report.has_errors());
        assert!(report.errors()[0].contains("ttl_secs"));
    }

    #[test]
    fn zero_ttl_is_an_error() {
        let mut cfg = valid_config();
        cfg.cache.ttl_secs = Some(0);
        assert!(cfg.validate().has_errors());
    }

    #[test]
    fn missing_origin_is_an_error() {
        let mut cfg = valid_config();
        cfg.origin.address = String::new();
        assert!(cfg.validate().has_errors());
    }

    #[test]
    fn origin_with_scheme_is_an_error() {
        let mut cfg = valid_config();
        cfg.origin.address = "http://origin:9000".into();
        assert!(cfg.validate().has_errors());
    }

    #[test]
    fn bad_listen_address_is_an_error() {
        let mut cfg = valid_config();
        cfg.server.listen = "not-an-address".into();
        assert!(cfg.validate().has_errors());
    }

    #[test]
    fn memory_backend_needs_no_store_url() {
        let mut cfg = valid_config();
        cfg.cache.backend = StoreBackendKind::Memory;
        cfg.cache.store_url = String::new();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn redis_backend_requires_store_url() {
        let mut cfg = valid_config();
        cfg.cache.store_url = String::new();
        assert!(cfg.validate().has_errors());
    }
}

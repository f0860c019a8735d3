use serde::Deserialize;

// =======================================================
// ORIGIN CONFIG + DEFAULTS
// =======================================================
//
// The origin is the single upstream this frontend forwards cache misses
// to. `address` has no usable default and must be set in varnix.conf.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    pub address: String,

    // Timeouts (seconds)
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,

    // Limits (bytes)
    pub max_response_headers_bytes: u64,
    pub max_response_body_bytes: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
            max_response_headers_bytes: 64 * 1024,
            max_response_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl OriginConfig {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs
    }

    pub fn read_timeout_secs(&self) -> u64 {
        self.read_timeout_secs
    }

    pub fn write_timeout_secs(&self) -> u64 {
        self.write_timeout_secs
    }

    pub fn max_response_headers_bytes(&self) -> u64 {
        self.max_response_headers_bytes
    }

    pub fn max_response_body_bytes(&self) -> u64 {
        self.max_response_body_bytes
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &OriginConfig) {
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = defaults.connect_timeout_secs;
        }
        if self.read_timeout_secs == 0 {
            self.read_timeout_secs = defaults.read_timeout_secs;
        }
        if self.write_timeout_secs == 0 {
            self.write_timeout_secs = defaults.write_timeout_secs;
        }
        if self.max_response_headers_bytes == 0 {
            self.max_response_headers_bytes = defaults.max_response_headers_bytes;
        }
        if self.max_response_body_bytes == 0 {
            self.max_response_body_bytes = defaults.max_response_body_bytes;
        }
    }
}

use serde::Deserialize;

// =======================================================
// SERVER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub keepalive_timeout_secs: u64,
    pub client_read_timeout_secs: u64,

    // Limits (bytes)
    pub max_request_headers_bytes: u64,
    pub max_request_body_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            keepalive_timeout_secs: 65,
            client_read_timeout_secs: 15,
            max_request_headers_bytes: 64 * 1024,
            max_request_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen(&self) -> &str {
        &self.listen
    }

    pub fn keepalive_timeout_secs(&self) -> u64 {
        self.keepalive_timeout_secs
    }

    pub fn client_read_timeout_secs(&self) -> u64 {
        self.client_read_timeout_secs
    }

    pub fn max_request_headers_bytes(&self) -> u64 {
        self.max_request_headers_bytes
    }

    pub fn max_request_body_bytes(&self) -> u64 {
        self.max_request_body_bytes
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &ServerConfig) {
        if self.listen.is_empty() {
            self.listen = defaults.listen.clone();
        }
        if self.keepalive_timeout_secs == 0 {
            self.keepalive_timeout_secs = defaults.keepalive_timeout_secs;
        }
        if self.client_read_timeout_secs == 0 {
            self.client_read_timeout_secs = defaults.client_read_timeout_secs;
        }
        if self.max_request_headers_bytes == 0 {
            self.max_request_headers_bytes = defaults.max_request_headers_bytes;
        }
        if self.max_request_body_bytes == 0 {
            self.max_request_body_bytes = defaults.max_request_body_bytes;
        }
    }
}

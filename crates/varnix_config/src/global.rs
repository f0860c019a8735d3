use serde::Deserialize;

// =======================================================
// GLOBAL CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
    pub max_connections: u16,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            max_connections: 1024,
        }
    }
}

impl GlobalConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn max_connections(&self) -> u16 {
        self.max_connections
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &GlobalConfig) {
        if self.log_level.is_empty() {
            self.log_level = defaults.log_level.clone();
        }
        if self.max_connections == 0 {
            self.max_connections = defaults.max_connections;
        }
    }
}

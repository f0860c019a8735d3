use serde::Deserialize;

use crate::validation::{ConfigReport, validate};
use crate::{CacheConfig, GlobalConfig, OriginConfig, ServerConfig};

// =======================================================
// VARNIX CONFIG — main config
// =======================================================
#[derive(Debug, Deserialize)]
pub struct VarnixConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub origin: OriginConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for VarnixConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            server: ServerConfig::default(),
            origin: OriginConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl VarnixConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn origin(&self) -> &OriginConfig {
        &self.origin
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Ini).required(false))
            .build()?;

        let mut cfg: VarnixConfig = built.try_deserialize()?;

        cfg.apply_defaults();
        Ok(cfg)
    }

    fn apply_defaults(&mut self) {
        let def_global = GlobalConfig::default();
        self.global.apply_defaults_from(&def_global);

        let def_server = ServerConfig::default();
        self.server.apply_defaults_from(&def_server);

        let def_origin = OriginConfig::default();
        self.origin.apply_defaults_from(&def_origin);
    }

    pub fn print(&self) {
        println!("=============== VARNIX CONFIG ================");

        println!("\n[global]");
        println!("  log_level            = {}", self.global.log_level);
        println!("  max_connections      = {}", self.global.max_connections);

        println!("\n[server]");
        println!("  listen               = {}", self.server.listen);
        println!(
            "  keepalive_timeout_secs = {}",
            self.server.keepalive_timeout_secs
        );
        println!(
            "  client_read_timeout_secs = {}",
            self.server.client_read_timeout_secs
        );
        println!(
            "  max_request_headers_bytes = {}",
            self.server.max_request_headers_bytes
        );
        println!(
            "  max_request_body_bytes = {}",
            self.server.max_request_body_bytes
        );

        println!("\n[origin]");
        println!("  address              = {}", self.origin.address);
        println!(
            "  connect_timeout_secs = {}",
            self.origin.connect_timeout_secs
        );
        println!("  read_timeout_secs    = {}", self.origin.read_timeout_secs);
        println!(
            "  write_timeout_secs   = {}",
            self.origin.write_timeout_secs
        );
        println!(
            "  max_response_headers_bytes = {}",
            self.origin.max_response_headers_bytes
        );
        println!(
            "  max_response_body_bytes = {}",
            self.origin.max_response_body_bytes
        );

        println!("\n[cache]");
        println!("  ttl_secs             = {:?}", self.cache.ttl_secs);
        println!("  backend              = {:?}", self.cache.backend);
        println!("  store_url            = {}", self.cache.store_url);

        println!("==============================================");
    }
}

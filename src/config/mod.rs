use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub sources: SourceConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub redis_url: String,
    /// TTL for the aggregated snapshot; <= 0 disables expiry.
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// Serve deterministic synthetic data instead of hitting upstream APIs.
    pub mock_api: bool,
    /// Security-relevant escape hatch: disables TLS certificate verification
    /// on upstream requests. Off unless explicitly opted into.
    pub disable_tls_verify: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            ttl_seconds: 30,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mock_api: false,
            disable_tls_verify: false,
            request_timeout_secs: 10,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            sources: SourceConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    /// Environment variables take precedence over the config file so the
    /// service can be reconfigured without editing TOML.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("REDIS_URL") {
            self.cache.redis_url = url;
        }
        if let Ok(ttl) = env::var("CACHE_TTL") {
            if let Ok(ttl) = ttl.parse() {
                self.cache.ttl_seconds = ttl;
            }
        }
        if let Ok(v) = env::var("MOCK_API") {
            self.sources.mock_api = v == "1";
        }
        if let Ok(v) = env::var("DISABLE_TLS_VERIFY") {
            self.sources.disable_tls_verify = v == "1";
        }
        if let Ok(ms) = env::var("SCHED_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                self.scheduler.interval_ms = ms;
            }
        }
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }
}

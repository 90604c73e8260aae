use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Base directory holding the `tokens` and `index` namespaces.
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Sliding session lifetime; every successful fetch extends expiry by this much.
    pub lifetime_seconds: u64,
    /// Interval between background sweeps of expired records.
    pub sweep_interval_seconds: u64,
    /// When true the emitted cookie omits the `Secure` attribute (non-TLS deployments).
    pub debug: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("tmp/sessions"),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_seconds: 86_400,
            sweep_interval_seconds: 3_600,
            debug: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Session.toml (base configuration file)
    /// 2. Environment variables prefixed with SESSION_, using `__` as the
    ///    section separator (e.g. SESSION_STORAGE__BASE_DIR)
    pub fn load() -> Result<Self, figment::Error> {
        let figment = Figment::new()
            // Start with defaults
            .merge(Toml::string(&toml::to_string(&Config::default()).unwrap()).nested())
            // Layer on Session.toml if it exists
            .merge(Toml::file("Session.toml").nested())
            // Layer on environment variables (e.g., SESSION_SESSION__LIFETIME_SECONDS)
            .merge(Env::prefixed("SESSION_").split("__"));

        figment.extract()
    }
}

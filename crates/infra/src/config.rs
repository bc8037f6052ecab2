//! Configuration loading and representation.
//!
//! Sources are merged in order, later ones winning:
//! 1. `AppConfig::default()`
//! 2. a TOML file (`keystone.toml` unless another path is given), if present
//! 3. `KEYSTONE_*` environment variables, `__` separating nested keys
//!    (e.g. `KEYSTONE_AUTH__JWT_KEY`)

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use keystone_auth::{AuthConfig, ConfigError};

pub const ENV_PREFIX: &str = "KEYSTONE_";
pub const DEFAULT_CONFIG_FILE: &str = "keystone.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info".to_string(),
        }
    }
}

/// Initial administrator seeded at startup when a password is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub admin_role: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_email: "admin@localhost".to_string(),
            admin_password: None,
            admin_role: "ADMINISTRATOR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration: {0}")]
    Extract(#[from] figment::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl AppConfig {
    /// Load from defaults, `keystone.toml` and the environment.
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if path.exists() {
            debug!(path = %path.display(), "loading configuration file");
            figment = figment.merge(Toml::file(path));
        }
        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.auth.validate()?;
        Ok(config)
    }
}

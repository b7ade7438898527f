use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    common::{RelayError, RelayResult},
    configs::*,
};

const CONFIG_FILES: [&str; 2] = ["config.toml", "config.default.toml"];

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub ambient: AmbientConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reads `config.toml`, then `config.default.toml`, and falls back to the
    /// built-in defaults when neither exists. Environment overrides are
    /// applied last.
    pub fn load() -> RelayResult<Self> {
        let mut config = match CONFIG_FILES.iter().find(|p| Path::new(p).exists()) {
            Some(path) => {
                println!("Loading configuration from: {}", path);
                Self::from_file(path)?
            }
            None => {
                println!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RelayResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw).map_err(|e| RelayError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.gateway.api_key = Some(key);
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Startup checks that cannot be expressed through serde defaults.
    pub fn validate(&self) -> RelayResult<()> {
        if self.gateway.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(RelayError::Config(
                "no gateway API key; set OPENAI_API_KEY or gateway.api_key".into(),
            ));
        }
        if self.ambient.sample_rate == 0 {
            return Err(RelayError::Config("ambient.sample_rate must be > 0".into()));
        }
        Ok(())
    }
}

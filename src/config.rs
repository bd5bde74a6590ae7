//! Framework configuration.
//!
//! [`DataConfig`] carries the settings resolved once at startup, currently
//! the physical table-name prefix substituted for the schema's `{{prefix}}`
//! placeholder. `DataConfig::load()` reads `config/config.toml` when present
//! and falls back to `EXTDATA`-prefixed environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Prefix applied to physical table names (the active database prefix).
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

fn default_table_prefix() -> String {
    "xt_".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
        }
    }
}

impl DataConfig {
    /// Configuration with an explicit table prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: prefix.into(),
        }
    }

    /// Load configuration from `config/config.toml` (optional) and
    /// `EXTDATA`-prefixed environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/config.toml").required(false))
            .add_source(Environment::with_prefix("EXTDATA").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // If the file existed but was unreadable, warn and retry with env only.
                if std::path::Path::new("config/config.toml").exists() {
                    log::warn!("failed to load config file, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("EXTDATA").separator("__"))
                    .build()?
            }
        };

        // The `data` section is entirely optional; every field has a default.
        match settings.get::<DataConfig>("data") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }
}

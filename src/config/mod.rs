//! TOML application configuration with per-environment overlays.
//!
//! ```toml
//! env = "staging"          # optional, picks the overlay below
//! host = "0.0.0.0"
//! port = 8080
//! static_dir = "public"
//! pretty = false
//!
//! [keys]
//! "k-123" = []                       # any host
//! "k-456" = ["api.example.com"]      # only this Host header
//!
//! [environments.staging]
//! port = 9090
//! pretty = true
//! ```
//!
//! The overlay named by the selected environment is merged over the base
//! values before the file is deserialized. Selecting an environment the file
//! does not define logs a warning (except `dev`) and keeps the base values.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

const ENVIRONMENTS_KEY: &str = "environments";
const ENV_KEY: &str = "env";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory served under `/public`.
    pub static_dir: PathBuf,
    pub pretty: bool,
    /// API key → hosts allowed to use it (empty means any host).
    pub keys: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: PathBuf::from("public"),
            pretty: false,
            keys: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// whatever [`from_toml_str`](Self::from_toml_str) returns.
    pub fn load(path: impl AsRef<Path>, env: Option<&str>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, env)
    }

    /// Parses `src`, applying the overlay for `env` (or for the file's own
    /// `env` key when `env` is `None`).
    ///
    /// ```
    /// use restkit::config::Config;
    ///
    /// let src = r#"
    ///     port = 8080
    ///     [environments.prod]
    ///     port = 80
    /// "#;
    /// assert_eq!(Config::from_toml_str(src, None).unwrap().port, 8080);
    /// assert_eq!(Config::from_toml_str(src, Some("prod")).unwrap().port, 80);
    /// ```
    pub fn from_toml_str(src: &str, env: Option<&str>) -> Result<Self, ConfigError> {
        let mut table: toml::Table = src.parse()?;
        let environments = table.remove(ENVIRONMENTS_KEY);
        let selected = match table.remove(ENV_KEY) {
            Some(toml::Value::String(name)) => Some(name),
            Some(_) => return Err(ConfigError::invalid_value(ENV_KEY, "expected a string")),
            None => None,
        };

        if let Some(env) = env.map(str::to_owned).or(selected) {
            match environments.as_ref().and_then(|all| all.get(&env)) {
                Some(toml::Value::Table(overlay)) => merge(&mut table, overlay.clone()),
                Some(_) => {
                    return Err(ConfigError::invalid_value(
                        format!("{ENVIRONMENTS_KEY}.{env}"),
                        "expected a table",
                    ));
                }
                None if env != "dev" => {
                    warn!(environment = %env, "environment not found in config file");
                }
                None => {}
            }
        }

        let config: Config = table.try_into()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid_value("host", "must not be empty"));
        }
        Ok(())
    }

    /// The address to bind, `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => merge(existing, nested),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

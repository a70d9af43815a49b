//! Application configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. The result is checked with [`AppConfig::validate`].

use crate::middleware::ErrorHandlerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_KEY: &str = "MY_SECRET_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub errors: ErrorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests running longer than this are answered with 408
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> ConfigResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bad bind address {}:{}", self.host, self.port)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// redb file; created on first start
    pub path: PathBuf,
    /// Keep everything in memory instead; nothing survives a restart
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("postboard.redb"),
            in_memory: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Signs JWTs and doubles as the static API key
    pub secret_key: String,
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
    pub issuer: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_API_KEY.to_string(),
            token_ttl: crate::service::auth::DEFAULT_TOKEN_TTL,
            issuer: crate::service::auth::DEFAULT_ISSUER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            service_name: crate::logger::DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    pub enable_stack_trace: bool,
    pub enable_detailed_errors: bool,
    pub default_message: Option<String>,
}

impl ErrorsConfig {
    pub fn handler_config(&self) -> ErrorHandlerConfig {
        let mut config = ErrorHandlerConfig {
            enable_stack_trace: self.enable_stack_trace,
            enable_detailed_errors: self.enable_detailed_errors,
            ..ErrorHandlerConfig::default()
        };
        if let Some(message) = &self.default_message {
            config.default_message = message.clone();
        }
        config
    }
}

impl AppConfig {
    /// Defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply environment overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("DATABASE_PATH").or_else(|| var("DATABASE_URL")) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(key) = var("API_SECRET_KEY") {
            self.auth.secret_key = key;
        }
        if let Some(host) = var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("SERVER_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "SERVER_PORT",
                value: port,
            })?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "LOG_FORMAT",
                        value: format,
                    })
                }
            };
        }

        if var("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("development")) {
            self.errors.enable_detailed_errors = true;
            self.errors.enable_stack_trace = true;
        }
        if let Some(value) = var("POSTBOARD_DETAILED_ERRORS") {
            self.errors.enable_detailed_errors = parse_bool("POSTBOARD_DETAILED_ERRORS", value)?;
        }
        if let Some(value) = var("POSTBOARD_STACK_TRACE") {
            self.errors.enable_stack_trace = parse_bool("POSTBOARD_STACK_TRACE", value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.auth.secret_key.is_empty() {
            return Err(ConfigError::Invalid("auth.secret_key is required".to_string()));
        }
        if self.auth.token_ttl.is_zero() {
            return Err(ConfigError::Invalid("auth.token_ttl must be positive".to_string()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_string()));
        }
        if self.server.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "server.request_timeout must be positive".to_string(),
            ));
        }
        if !self.database.in_memory && self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path is required".to_string()));
        }
        self.server.bind_address()?;
        Ok(())
    }
}

fn parse_bool(key: &'static str, value: String) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.secret_key, DEFAULT_API_KEY);
        assert!(!config.errors.enable_detailed_errors);
    }

    #[test]
    fn test_toml_sections_and_durations() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9000
            request_timeout = "5s"

            [auth]
            token_ttl = "2h"

            [logging]
            format = "json"

            [errors]
            default_message = "Something broke"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.request_timeout, Duration::from_secs(5));
        assert_eq!(config.auth.token_ttl, Duration::from_secs(7200));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.errors.handler_config().default_message, "Something broke");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("SERVER_PORT", "3000"),
                ("DATABASE_URL", "/var/lib/postboard.redb"),
                ("API_SECRET_KEY", "s3cret"),
                ("APP_ENV", "development"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, PathBuf::from("/var/lib/postboard.redb"));
        assert_eq!(config.auth.secret_key, "s3cret");
        assert!(config.errors.enable_detailed_errors);
        assert!(config.errors.enable_stack_trace);
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("SERVER_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "SERVER_PORT", .. }));

        let err = config
            .apply_env(env(&[("POSTBOARD_DETAILED_ERRORS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let mut config = AppConfig::default();
        config.auth.secret_key.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn test_load_reads_process_environment() {
        std::env::set_var("SERVER_PORT", "8181");
        let config = AppConfig::load(None);
        std::env::remove_var("SERVER_PORT");

        assert_eq!(config.unwrap().server.port, 8181);
    }
}

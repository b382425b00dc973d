//! Application configuration loaded from environment variables.

use checkout::{DEFAULT_GATEWAY_URL, DEFAULT_MAX_COMMIT_ATTEMPTS};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Server configuration.
///
/// Reads from environment variables (a `.env` file is loaded first by
/// `main`):
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL event store; in-memory when unset
/// - `PAYMENT_GATEWAY_URL`: gateway base URL
/// - `PAYMENT_SECRET_KEY`: gateway secret; an in-memory gateway is used when unset
/// - `CHECKOUT_MAX_ATTEMPTS`: commit attempts before giving up (default 16)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub gateway_url: String,
    pub gateway_secret_key: Option<String>,
    pub max_commit_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a port number",
                value,
            })?,
            None => defaults.port,
        };

        let log_format = match non_empty("LOG_FORMAT") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" | "pretty" => LogFormat::Text,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "LOG_FORMAT",
                        expected: "`text` or `json`",
                        value,
                    });
                }
            },
            None => defaults.log_format,
        };

        let max_commit_attempts = match non_empty("CHECKOUT_MAX_ATTEMPTS") {
            Some(value) => match value.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "CHECKOUT_MAX_ATTEMPTS",
                        expected: "a positive integer",
                        value,
                    });
                }
            },
            None => defaults.max_commit_attempts,
        };

        Ok(Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port,
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: non_empty("DATABASE_URL"),
            gateway_url: non_empty("PAYMENT_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            gateway_secret_key: non_empty("PAYMENT_SECRET_KEY"),
            max_commit_attempts,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_secret_key: None,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert!(config.gateway_secret_key.is_none());
        assert_eq!(config.gateway_url, "https://api.tosspayments.com");
        assert_eq!(config.max_commit_attempts, 16);
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/market"),
            ("PAYMENT_SECRET_KEY", "test_sk"),
            ("CHECKOUT_MAX_ATTEMPTS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/market")
        );
        assert_eq!(config.gateway_secret_key.as_deref(), Some("test_sk"));
        assert_eq!(config.max_commit_attempts, 4);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", " "), ("PORT", "")])).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CHECKOUT_MAX_ATTEMPTS", "0")])).is_err());
    }
}

//! Process configuration, read once from environment variables.

use std::net::{AddrParseError, SocketAddr};

use thiserror::Error;

use invoicer_observability::{LogFormat, UnknownLogFormat};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_ADDR '{value}' is not a socket address: {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error("{key} must be 'true' or 'false', got '{value}'")]
    InvalidBool { key: &'static str, value: String },

    #[error("DATABASE_URL is required when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,

    #[error("LOG_FORMAT: {0}")]
    LogFormat(#[from] UnknownLogFormat),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Unset and empty variables both fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_value = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_value
            .trim()
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_value.clone(),
                source,
            })?;

        let use_persistent_stores = match var("USE_PERSISTENT_STORES") {
            None => false,
            Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
        };

        let database_url = var("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let log_format = match var("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(v) => v.parse::<LogFormat>()?,
        };

        Ok(Self {
            bind_addr,
            use_persistent_stores,
            database_url,
            log_format,
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        assert_eq!(config(&[]).unwrap(), AppConfig::default());
        assert_eq!(
            AppConfig::default().bind_addr,
            DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("USE_PERSISTENT_STORES", "TRUE"),
            ("DATABASE_URL", "postgres://localhost/invoices"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert!(cfg.use_persistent_stores);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/invoices"));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        let err = config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config(&[("BIND_ADDR", "localhost")]),
            Err(ConfigError::InvalidBindAddr { .. })
        ));
        assert!(matches!(
            config(&[("USE_PERSISTENT_STORES", "sometimes")]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            config(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::LogFormat(_))
        ));
    }
}

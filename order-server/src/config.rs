//! Order server configuration

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Order server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL (`sqlite:orders.db`, `sqlite::memory:`)
    pub database_url: String,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Staff push notifications are posted here when set
    pub push_webhook_url: Option<String>,
    /// Concurrent WebSocket subscribers allowed per venue
    pub max_ws_per_venue: usize,
    pub log_level: String,
    /// Daily rolling log files go here when set
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:orders.db".into(),
            http_port: 8080,
            environment: "development".into(),
            push_webhook_url: None,
            max_ws_per_venue: 50,
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            http_port: parse_var(&var, "HTTP_PORT", "port number")?.unwrap_or(defaults.http_port),
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
            push_webhook_url: var("PUSH_WEBHOOK_URL"),
            max_ws_per_venue: parse_var(&var, "MAX_WS_PER_VENUE", "connection count")?
                .unwrap_or(defaults.max_ws_per_venue),
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: var("LOG_DIR"),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

fn parse_var<T, F>(
    var: &F,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value,
            }),
    }
}

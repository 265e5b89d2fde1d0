//! Environment-driven configuration structures shared by all binaries.

use std::{env, time::Duration};

use thiserror::Error;

const DEFAULT_MONITORING_EXPIRE_SECS: u64 = 86_400;
const DEFAULT_MONITORING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Connection details for the Nagios/Icinga instance plus the retention of
/// the records cached from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    url: String,
    user: Option<String>,
    password: Option<String>,
    expire: Duration,
    timeout: Duration,
    service_history: Option<usize>,
}

impl MonitoringConfig {
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            url: get_required_var("MONITORING_URL")?,
            user: get_optional_var("MONITORING_USER"),
            password: get_optional_var("MONITORING_PASSWORD"),
            expire: Duration::from_secs(get_number_or(
                "MONITORING_EXPIRE",
                DEFAULT_MONITORING_EXPIRE_SECS,
            )?),
            timeout: Duration::from_secs(get_number_or(
                "MONITORING_TIMEOUT_SECS",
                DEFAULT_MONITORING_TIMEOUT_SECS,
            )?),
            service_history: get_optional_number("MONITORING_SERVICE_HISTORY")?
                .map(|len| len as usize),
        })
    }

    /// CGI base URL, always ending in `/`.
    pub fn url(&self) -> String {
        if self.url.ends_with('/') {
            self.url.clone()
        } else {
            format!("{}/", self.url)
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Fallback lifetime of cached records when the store has no
    /// `nagios_instance.expire`.
    pub fn expire(&self) -> Duration {
        self.expire
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum service check entries kept per node; `None` keeps everything.
    pub fn service_history(&self) -> Option<usize> {
        self.service_history
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    redis_url: String,
    api_bind_address: String,
    monitoring: MonitoringConfig,
}

impl ApiConfig {
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            redis_url: get_required_var("REDIS_URL")?,
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            monitoring: MonitoringConfig::load_from_env()?,
        })
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn monitoring(&self) -> &MonitoringConfig {
        &self.monitoring
    }
}

/// Configuration of the scheduled refresh binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    redis_url: String,
    poll_interval: Duration,
    monitoring: MonitoringConfig,
}

impl MonitorConfig {
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            redis_url: get_required_var("REDIS_URL")?,
            poll_interval: Duration::from_secs(get_number_or(
                "MONITOR_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            monitoring: MonitoringConfig::load_from_env()?,
        })
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn monitoring(&self) -> &MonitoringConfig {
        &self.monitoring
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_optional_number(key: &'static str) -> Result<Option<u64>, ConfigError> {
    get_optional_var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|source| ConfigError::InvalidNumber { key, source })
        })
        .transpose()
}

fn get_number_or(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    Ok(get_optional_number(key)?.unwrap_or(default))
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("DOTM_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

/// Serializes tests that mutate the process environment.
#[cfg(test)]
pub(crate) fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    static ENV_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());
    ENV_GUARD
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_env() {
        std::env::set_var("DOTM_SKIP_DOTENV", "1");
        std::env::set_var("REDIS_URL", "redis://127.0.0.1:6379/0");
        std::env::set_var("API_BIND_ADDRESS", "127.0.0.1:8080");
        std::env::set_var("MONITORING_URL", "http://icinga.local/icinga/cgi-bin");
        std::env::set_var("MONITORING_USER", "dotm");
        std::env::set_var("MONITORING_PASSWORD", "secret");
        std::env::remove_var("MONITORING_EXPIRE");
        std::env::remove_var("MONITORING_TIMEOUT_SECS");
        std::env::remove_var("MONITORING_SERVICE_HISTORY");
        std::env::remove_var("MONITOR_POLL_INTERVAL_SECS");
    }

    #[test]
    fn api_config_reads_env_with_defaults() {
        let _guard = env_guard();
        set_env();

        let config = ApiConfig::load_from_env().expect("api config loads");
        assert_eq!(config.redis_url(), "redis://127.0.0.1:6379/0");
        assert_eq!(config.api_bind_address(), "127.0.0.1:8080");
        let monitoring = config.monitoring();
        assert_eq!(monitoring.url(), "http://icinga.local/icinga/cgi-bin/");
        assert_eq!(monitoring.user(), Some("dotm"));
        assert_eq!(monitoring.password(), Some("secret"));
        assert_eq!(monitoring.expire(), Duration::from_secs(86_400));
        assert_eq!(monitoring.timeout(), Duration::from_secs(30));
        assert_eq!(monitoring.service_history(), None);
    }

    #[test]
    fn monitor_config_reads_overrides() {
        let _guard = env_guard();
        set_env();
        std::env::set_var("MONITOR_POLL_INTERVAL_SECS", "15");
        std::env::set_var("MONITORING_EXPIRE", "3600");
        std::env::set_var("MONITORING_SERVICE_HISTORY", " 50 ");

        let config = MonitorConfig::load_from_env().expect("monitor config loads");
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.monitoring().expire(), Duration::from_secs(3600));
        assert_eq!(config.monitoring().service_history(), Some(50));

        set_env();
    }

    #[test]
    fn empty_required_env_var_is_treated_as_missing() {
        let _guard = env_guard();
        set_env();
        std::env::set_var("REDIS_URL", "   ");

        let err = MonitorConfig::load_from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar { key: "REDIS_URL" }));

        set_env();
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let _guard = env_guard();
        set_env();
        std::env::set_var("MONITORING_EXPIRE", "one day");

        let err = MonitoringConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "MONITORING_EXPIRE",
                ..
            }
        ));

        set_env();
    }

    #[test]
    fn optional_credentials_may_be_absent() {
        let _guard = env_guard();
        set_env();
        std::env::remove_var("MONITORING_USER");
        std::env::remove_var("MONITORING_PASSWORD");

        let config = MonitoringConfig::load_from_env().expect("config loads");
        assert_eq!(config.user(), None);
        assert_eq!(config.password(), None);

        set_env();
    }
}

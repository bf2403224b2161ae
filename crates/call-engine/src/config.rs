use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{CallCenterError, Result};

/// Call center configuration
///
/// Encompasses the two external interfaces the router depends on (the ARI
/// control connection to the media server and the Redis shared store) plus
/// general engine behavior.
///
/// # Examples
///
/// ```
/// use dialer_call_engine::config::CallCenterConfig;
///
/// let config = CallCenterConfig::default();
/// assert_eq!(config.ari.app_name, "dialer");
/// config.validate().expect("default configuration is valid");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallCenterConfig {
    /// Media-server control connection settings
    pub ari: AriConfig,

    /// Shared store connection settings
    pub redis: RedisConfig,

    /// General engine behavior
    pub general: GeneralConfig,
}

/// ARI control connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AriConfig {
    /// Media server host
    pub host: String,

    /// Media server ARI port
    pub port: u16,

    /// ARI username
    pub username: String,

    /// ARI password
    pub password: String,

    /// Stasis application name channels are delivered to
    pub app_name: String,
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis host
    pub host: String,

    /// Redis port
    pub port: u16,

    /// Optional Redis password
    pub password: Option<String>,
}

/// General engine behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter directive applied when the binary installs its subscriber
    pub log_level: String,

    /// Seconds an agent spends in wrap-up after a bridged call ends.
    /// Zero disables wrap-up: the agent returns to available immediately.
    pub wrap_up_seconds: u64,
}

impl Default for AriConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            username: "asterisk".to_string(),
            password: "asterisk".to_string(),
            app_name: "dialer".to_string(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            wrap_up_seconds: 0,
        }
    }
}

impl Default for CallCenterConfig {
    fn default() -> Self {
        Self {
            ari: AriConfig::default(),
            redis: RedisConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl AriConfig {
    /// Base URL of the ARI REST interface
    pub fn rest_url(&self) -> String {
        format!("http://{}:{}/ari", self.host, self.port)
    }

    /// WebSocket URL delivering application events
    pub fn events_url(&self) -> String {
        format!(
            "ws://{}:{}/ari/events?app={}&api_key={}:{}",
            self.host, self.port, self.app_name, self.username, self.password
        )
    }
}

impl RedisConfig {
    /// Connection URL for the shared store
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/", password, self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

impl CallCenterConfig {
    /// Load configuration from the process environment
    ///
    /// Recognized variables: `ARI_HOST`, `ARI_PORT`, `ARI_USERNAME`,
    /// `ARI_PASSWORD`, `ARI_APP_NAME`, `REDIS_HOST`, `REDIS_PORT`,
    /// `REDIS_PASSWORD`, `LOG_LEVEL`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            ari: AriConfig {
                host: env_or("ARI_HOST", defaults.ari.host),
                port: env_port("ARI_PORT", defaults.ari.port)?,
                username: env_or("ARI_USERNAME", defaults.ari.username),
                password: env_or("ARI_PASSWORD", defaults.ari.password),
                app_name: env_or("ARI_APP_NAME", defaults.ari.app_name),
            },
            redis: RedisConfig {
                host: env_or("REDIS_HOST", defaults.redis.host),
                port: env_port("REDIS_PORT", defaults.redis.port)?,
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
            },
            general: GeneralConfig {
                log_level: env_or("LOG_LEVEL", defaults.general.log_level),
                wrap_up_seconds: defaults.general.wrap_up_seconds,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ari.host.is_empty() {
            return Err(CallCenterError::configuration("ARI host must not be empty"));
        }
        if self.ari.app_name.is_empty() {
            return Err(CallCenterError::configuration(
                "ARI application name must not be empty",
            ));
        }
        if self.ari.username.is_empty() || self.ari.password.is_empty() {
            return Err(CallCenterError::configuration(
                "ARI credentials must not be empty",
            ));
        }
        if self.redis.host.is_empty() {
            return Err(CallCenterError::configuration(
                "Redis host must not be empty",
            ));
        }
        Ok(())
    }
}

fn env_or(name: &str, default: String) -> String {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default,
    }
}

fn env_port(name: &str, default: u16) -> Result<u16> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value.parse::<u16>().map_err(|_| {
            CallCenterError::configuration(format!("{} is not a valid port: {}", name, value))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CallCenterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ari.app_name, "dialer");
        assert_eq!(config.redis.port, 6379);
    }

    #[test]
    fn urls_are_assembled_from_parts() {
        let config = CallCenterConfig::default();
        assert_eq!(config.ari.rest_url(), "http://127.0.0.1:8088/ari");
        assert!(config.ari.events_url().starts_with("ws://127.0.0.1:8088/ari/events?app=dialer"));
        assert_eq!(config.redis.url(), "redis://127.0.0.1:6379/");

        let with_password = RedisConfig {
            password: Some("secret".to_string()),
            ..RedisConfig::default()
        };
        assert_eq!(with_password.url(), "redis://:secret@127.0.0.1:6379/");
    }

    #[test]
    fn empty_app_name_is_rejected() {
        let mut config = CallCenterConfig::default();
        config.ari.app_name.clear();
        assert!(matches!(
            config.validate(),
            Err(CallCenterError::Configuration(_))
        ));
    }
}

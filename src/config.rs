//! Delivery, file and environment configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use job_api::url::DEFAULT_BASE_URL;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 86_400;

pub const ENV_TRANSPORT: &str = "JOB_RELAY_TRANSPORT";
pub const ENV_CONFIG_PATH: &str = "JOB_RELAY_CONFIG_PATH";
pub const ENV_STATE_DIR: &str = "JOB_RELAY_STATE_DIR";
pub const ENV_DEBUG: &str = "JOB_RELAY_DEBUG";

/// Knobs the coordinator needs while a job is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Delay between status polls once the pull channel is active.
    pub poll_interval: Duration,
    /// Polls allowed before a still-running job is reported as timed out.
    pub max_poll_attempts: u32,
    /// Base that relative output-artifact references resolve against.
    pub artifact_base_url: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            artifact_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl DeliveryConfig {
    #[must_use]
    pub fn new(artifact_base_url: impl Into<String>) -> Self {
        Self {
            artifact_base_url: artifact_base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the attempt ceiling; zero is raised to one.
    #[must_use]
    pub fn with_max_poll_attempts(mut self, max_poll_attempts: u32) -> Self {
        self.max_poll_attempts = max_poll_attempts.max(1);
        self
    }
}

/// JSON configuration file for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub base_url: String,
    #[serde(default)]
    pub artifact_base_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_sec: Option<u64>,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl RelayConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config =
            serde_json::from_str::<Self>(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: "must not be empty",
            });
        }
        if self.poll_interval_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.max_poll_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_poll_attempts",
                reason: "must be greater than zero",
            });
        }
        if self.timeout_sec == Some(0) {
            return Err(ConfigError::Invalid {
                field: "timeout_sec",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_sec.map(Duration::from_secs)
    }

    /// Delivery settings, with the artifact base defaulting to `base_url`.
    #[must_use]
    pub fn delivery_config(&self) -> DeliveryConfig {
        let artifact_base_url = self
            .artifact_base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.base_url);

        let mut config = DeliveryConfig::new(artifact_base_url);
        if let Some(interval) = self.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(interval));
        }
        if let Some(attempts) = self.max_poll_attempts {
            config = config.with_max_poll_attempts(attempts);
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportChoice {
    #[default]
    Mock,
    Http,
}

impl TransportChoice {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "mock" => Ok(Self::Mock),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

/// Environment configuration for hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub transport: TransportChoice,
    pub config_path: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub debug: bool,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = match env_string_opt(ENV_TRANSPORT) {
            Some(value) => TransportChoice::parse(&value)?,
            None => TransportChoice::default(),
        };
        let config_path = env_string_opt(ENV_CONFIG_PATH).map(PathBuf::from);

        if transport == TransportChoice::Http && config_path.is_none() {
            return Err(ConfigError::MissingConfigPath(ENV_CONFIG_PATH));
        }

        Ok(Self {
            transport,
            config_path,
            state_dir: env_string_opt(ENV_STATE_DIR).map(PathBuf::from),
            debug: env_flag(ENV_DEBUG),
        })
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn parse(raw: &str) -> Result<RelayConfig, serde_json::Error> {
        serde_json::from_str(raw)
    }

    #[test]
    fn env_defaults_to_mock_transport() {
        let _lock = env_lock();
        let _g1 = set_env_guard(ENV_TRANSPORT, None);
        let _g2 = set_env_guard(ENV_CONFIG_PATH, None);
        let _g3 = set_env_guard(ENV_STATE_DIR, None);
        let _g4 = set_env_guard(ENV_DEBUG, None);

        let config = EnvConfig::from_env().expect("defaults should load");
        assert_eq!(config.transport, TransportChoice::Mock);
        assert!(config.config_path.is_none());
        assert!(config.state_dir.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn http_transport_requires_config_path() {
        let _lock = env_lock();
        let _g1 = set_env_guard(ENV_TRANSPORT, Some("http"));
        let _g2 = set_env_guard(ENV_CONFIG_PATH, None);

        let error = EnvConfig::from_env().expect_err("missing path must fail");
        assert!(matches!(error, ConfigError::MissingConfigPath(ENV_CONFIG_PATH)));
    }

    #[test]
    fn env_values_are_read() {
        let _lock = env_lock();
        let _g1 = set_env_guard(ENV_TRANSPORT, Some("HTTP"));
        let _g2 = set_env_guard(ENV_CONFIG_PATH, Some("/etc/relay.json"));
        let _g3 = set_env_guard(ENV_STATE_DIR, Some("/var/lib/relay"));
        let _g4 = set_env_guard(ENV_DEBUG, Some("1"));

        let config = EnvConfig::from_env().expect("env should load");
        assert_eq!(config.transport, TransportChoice::Http);
        assert_eq!(
            config.config_path.as_deref(),
            Some(Path::new("/etc/relay.json"))
        );
        assert_eq!(config.state_dir.as_deref(), Some(Path::new("/var/lib/relay")));
        assert!(config.debug);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let _lock = env_lock();
        let _g1 = set_env_guard(ENV_TRANSPORT, Some("carrier-pigeon"));

        assert!(matches!(
            EnvConfig::from_env(),
            Err(ConfigError::UnknownTransport(value)) if value == "carrier-pigeon"
        ));
    }

    #[test]
    fn relay_config_rejects_unknown_fields() {
        assert!(parse(r#"{"base_url":"https://x","retries":3}"#).is_err());
    }

    #[test]
    fn relay_config_rejects_zero_values() {
        let config = parse(r#"{"base_url":"https://x","poll_interval_ms":0}"#).expect("parses");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                ..
            })
        ));

        let config = parse(r#"{"base_url":" "}"#).expect("parses");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "base_url",
                ..
            })
        ));
    }

    #[test]
    fn delivery_config_defaults_artifact_base_to_api_base() {
        let config = parse(r#"{"base_url":"https://jobs.example.com/api"}"#).expect("parses");
        let delivery = config.delivery_config();

        assert_eq!(delivery.artifact_base_url, "https://jobs.example.com/api");
        assert_eq!(delivery.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(delivery.max_poll_attempts, DEFAULT_MAX_POLL_ATTEMPTS);
    }

    #[test]
    fn delivery_config_applies_overrides() {
        let config = parse(
            r#"{
                "base_url": "https://jobs.example.com/api",
                "artifact_base_url": "https://cdn.example.com",
                "poll_interval_ms": 250,
                "max_poll_attempts": 10,
                "timeout_sec": 30
            }"#,
        )
        .expect("parses");
        let delivery = config.delivery_config();

        assert_eq!(delivery.artifact_base_url, "https://cdn.example.com");
        assert_eq!(delivery.poll_interval, Duration::from_millis(250));
        assert_eq!(delivery.max_poll_attempts, 10);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let error = RelayConfig::from_path(Path::new("/definitely/missing/relay.json"))
            .expect_err("missing file must fail");
        assert!(matches!(error, ConfigError::Read { .. }));
    }
}

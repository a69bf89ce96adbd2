//! Configuration loading for pulse services
//!
//! Bootstrap settings are resolved in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Built-in defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FORWARD_CONCURRENCY: usize = 1;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_COACH_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COACH_MODEL: &str = "gpt-4o-mini";

/// Configuration file as written on disk; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub event_logger_url: Option<String>,
    #[serde(default)]
    pub event_logger_token: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub forward_concurrency: Option<usize>,
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,
    #[serde(default)]
    pub logging: TomlLogging,
    #[serde(default)]
    pub coach: TomlCoach,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlLogging {
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlCoach {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub event_logger_url: Option<String>,
    pub event_logger_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub forward_concurrency: Option<usize>,
    pub max_upload_bytes: Option<usize>,
    pub log_level: Option<String>,
    pub coach_api_key: Option<String>,
}

impl ConfigOverrides {
    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env_string("PULSE_HOST"),
            port: env_parse("PULSE_PORT")?,
            event_logger_url: env_string("EVENT_LOGGER_URL"),
            event_logger_token: env_string("EVENT_LOGGER_TOKEN"),
            request_timeout_secs: env_parse("PULSE_REQUEST_TIMEOUT_SECS")?,
            forward_concurrency: env_parse("PULSE_FORWARD_CONCURRENCY")?,
            max_upload_bytes: env_parse("PULSE_MAX_UPLOAD_BYTES")?,
            log_level: env_string("PULSE_LOG_LEVEL"),
            coach_api_key: env_string("OPENAI_API_KEY"),
        })
    }

    /// Field-wise merge; values already set on `self` win
    pub fn or(self, lower: ConfigOverrides) -> Self {
        Self {
            host: self.host.or(lower.host),
            port: self.port.or(lower.port),
            event_logger_url: self.event_logger_url.or(lower.event_logger_url),
            event_logger_token: self.event_logger_token.or(lower.event_logger_token),
            request_timeout_secs: self.request_timeout_secs.or(lower.request_timeout_secs),
            forward_concurrency: self.forward_concurrency.or(lower.forward_concurrency),
            max_upload_bytes: self.max_upload_bytes.or(lower.max_upload_bytes),
            log_level: self.log_level.or(lower.log_level),
            coach_api_key: self.coach_api_key.or(lower.coach_api_key),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(None),
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Coaching text-generation collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct CoachConfig {
    /// Absent key disables the breath check-in endpoint
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Fully resolved gateway configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the external event logger, without trailing slash
    pub event_logger_url: String,
    pub event_logger_token: String,
    /// Timeout applied to every outbound call
    pub request_timeout: Duration,
    /// Maximum in-flight forwarding calls per upload
    pub forward_concurrency: usize,
    pub max_upload_bytes: usize,
    pub logging: LoggingConfig,
    pub coach: CoachConfig,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Default configuration file location for the platform
///
/// `~/.config/pulse/config.toml` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pulse").join("config.toml"))
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Read the configuration file, if any
///
/// `config_path` is read when given (a missing explicit file is an error);
/// otherwise the platform default location is used if it exists.
pub fn load_config_file(config_path: Option<&Path>) -> Result<TomlConfig> {
    match config_path {
        Some(path) => load_toml_config(path),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => load_toml_config(&path),
            None => {
                debug!("No configuration file found, using environment and defaults");
                Ok(TomlConfig::default())
            }
        },
    }
}

/// Resolve the gateway configuration from overrides plus the config file
pub fn resolve_gateway_config(
    overrides: ConfigOverrides,
    config_path: Option<&Path>,
) -> Result<GatewayConfig> {
    build_gateway_config(overrides, load_config_file(config_path)?)
}

/// Merge overrides onto a parsed TOML file and validate the result
pub fn build_gateway_config(overrides: ConfigOverrides, file: TomlConfig) -> Result<GatewayConfig> {
    let event_logger_url = overrides
        .event_logger_url
        .or(file.event_logger_url)
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .ok_or_else(|| {
            Error::Config(
                "Event logger URL not configured. Set EVENT_LOGGER_URL, pass \
                 --event-logger-url, or add event_logger_url to config.toml"
                    .to_string(),
            )
        })?;
    if !(event_logger_url.starts_with("http://") || event_logger_url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Event logger URL must use http or https: {}",
            event_logger_url
        )));
    }

    let event_logger_token = overrides
        .event_logger_token
        .or(file.event_logger_token)
        .ok_or_else(|| {
            Error::Config(
                "Event logger token not configured. Set EVENT_LOGGER_TOKEN or add \
                 event_logger_token to config.toml"
                    .to_string(),
            )
        })?;

    let forward_concurrency = overrides
        .forward_concurrency
        .or(file.forward_concurrency)
        .unwrap_or(DEFAULT_FORWARD_CONCURRENCY);
    if forward_concurrency == 0 {
        return Err(Error::Config(
            "forward_concurrency must be at least 1".to_string(),
        ));
    }

    let request_timeout_secs = overrides
        .request_timeout_secs
        .or(file.request_timeout_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if request_timeout_secs == 0 {
        return Err(Error::Config(
            "request_timeout_secs must be at least 1".to_string(),
        ));
    }

    Ok(GatewayConfig {
        host: overrides
            .host
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
        event_logger_url,
        event_logger_token,
        request_timeout: Duration::from_secs(request_timeout_secs),
        forward_concurrency,
        max_upload_bytes: overrides
            .max_upload_bytes
            .or(file.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        logging: LoggingConfig {
            level: overrides
                .log_level
                .or(file.logging.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        },
        coach: CoachConfig {
            api_key: overrides.coach_api_key.or(file.coach.api_key),
            base_url: file
                .coach
                .base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_COACH_BASE_URL.to_string()),
            model: file
                .coach
                .model
                .unwrap_or_else(|| DEFAULT_COACH_MODEL.to_string()),
        },
    })
}

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono_tz::Tz;

use crate::workflows::checks::ChatId;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub reporting: ReportingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let timezone_name =
            env::var("APP_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone {
                value: timezone_name.clone(),
            })?;

        let observers = parse_chat_ids(&env::var("APP_OBSERVERS").unwrap_or_default())?;
        let bosses = parse_chat_ids(&env::var("APP_BOSSES").unwrap_or_default())?;
        let diagram_dir = optional_path("APP_DIAGRAM_DIR");
        let directory_dir = optional_path("APP_DIRECTORY_DIR");

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                with_target: environment != AppEnvironment::Production,
            },
            reporting: ReportingConfig {
                timezone,
                observers,
                bosses,
                diagram_dir,
                directory_dir,
            },
        })
    }
}

const DEFAULT_TIMEZONE: &str = "Europe/Moscow";

fn optional_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Parses a comma separated list of chat ids, ignoring blanks.
pub fn parse_chat_ids(raw: &str) -> Result<Vec<ChatId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<i64>()
                .map(ChatId)
                .map_err(|_| ConfigError::InvalidChatId {
                    value: value.to_string(),
                })
        })
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub with_target: bool,
}

/// Audience and localization settings for the check workflow.
#[derive(Debug, Clone)]
pub struct ReportingConfig {
    pub timezone: Tz,
    /// Fixed list copied on every submission and verification.
    pub observers: Vec<ChatId>,
    /// Owners receiving revenue, compliance and missing-report digests.
    pub bosses: Vec<ChatId>,
    pub diagram_dir: Option<PathBuf>,
    pub directory_dir: Option<PathBuf>,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Moscow,
            observers: Vec::new(),
            bosses: Vec::new(),
            diagram_dir: None,
            directory_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidChatId { value: String },
    InvalidTimezone { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidChatId { value } => {
                write!(f, "'{value}' is not a valid chat id in APP_OBSERVERS/APP_BOSSES")
            }
            ConfigError::InvalidTimezone { value } => {
                write!(f, "APP_TIMEZONE '{value}' is not a known IANA time zone")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidChatId { .. }
            | ConfigError::InvalidTimezone { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_TIMEZONE",
            "APP_OBSERVERS",
            "APP_BOSSES",
            "APP_DIAGRAM_DIR",
            "APP_DIRECTORY_DIR",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.reporting.timezone, chrono_tz::Europe::Moscow);
        assert!(config.reporting.observers.is_empty());
        assert!(config.reporting.diagram_dir.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn parses_audience_lists() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_OBSERVERS", "101, 202,,303");
        env::set_var("APP_BOSSES", "9");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.reporting.observers,
            vec![ChatId(101), ChatId(202), ChatId(303)]
        );
        assert_eq!(config.reporting.bosses, vec![ChatId(9)]);
        reset_env();
    }

    #[test]
    fn rejects_unknown_timezone() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_TIMEZONE", "Mars/Olympus");
        match AppConfig::load() {
            Err(ConfigError::InvalidTimezone { value }) => assert_eq!(value, "Mars/Olympus"),
            other => panic!("expected timezone error, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_chat_ids() {
        assert!(matches!(
            parse_chat_ids("12,abc"),
            Err(ConfigError::InvalidChatId { value }) if value == "abc"
        ));
    }
}

//! Configuration for Mailfleet

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// SMTP provider configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Dispatch pipeline configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (PostgreSQL)
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// SMTP provider configuration
///
/// Credentials are per sending account; this only carries the relay
/// endpoint shared by all accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay hostname
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Submission port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Use implicit TLS instead of STARTTLS
    #[serde(default)]
    pub use_tls: bool,

    /// Connection and send timeout in seconds
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            use_tls: false,
            timeout_secs: default_smtp_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout() -> u64 {
    30
}

/// Dispatch pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Pause between consecutive recipient sends, in seconds
    #[serde(default = "default_pace_secs")]
    pub pace_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pace_secs: default_pace_secs(),
        }
    }
}

fn default_pace_secs() -> u64 {
    2
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between polls for due campaigns, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter, EnvFilter syntax
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON-formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info,mailfleet=debug".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/mailfleet/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let smtp = SmtpConfig::default();
        assert_eq!(smtp.host, "smtp.gmail.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.timeout_secs, 30);

        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.pace_secs, 2);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
url = "postgres://localhost/mailfleet"

[smtp]
host = "smtp.example.com"
port = 465
use_tls = true

[dispatch]
pace_secs = 1
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.url, "postgres://localhost/mailfleet");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert!(config.smtp.use_tls);
        assert_eq!(config.dispatch.pace_secs, 1);
        assert_eq!(config.scheduler.poll_interval_secs, 30);
    }
}

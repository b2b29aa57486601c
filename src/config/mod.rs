//! Configuration management for the agentry server.
//!
//! Supports file-based configuration (TOML, YAML, JSON), environment
//! variable overrides, and validation. Integration credentials are read
//! from the conventional `GITHUB_TOKEN` and `SLACK_BOT_TOKEN` variables;
//! everything else uses the `AGENTRY_` prefix.

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable parsing error: {0}")]
    EnvVarParse(String),
    #[error("File parsing error: {0}")]
    FileParse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main configuration structure for the agentry server
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentryConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// GitHub integration configuration
    #[serde(default)]
    pub github: GithubConfig,
    /// Slack integration configuration
    #[serde(default)]
    pub slack: SlackConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// GitHub integration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Base URL of the GitHub REST API
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    /// Bearer token; tools fail at call time when unset
    pub token: Option<String>,
    /// User-Agent header sent with every request (GitHub requires one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// HTTP client timeout
    #[serde(with = "duration_seconds", default = "default_http_timeout")]
    pub timeout: Duration,
}

/// Slack integration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Base URL of the Slack Web API
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    /// Bot token; tools fail at call time when unset
    pub bot_token: Option<String>,
    /// HTTP client timeout
    #[serde(with = "duration_seconds", default = "default_http_timeout")]
    pub timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "agentry=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            token: None,
            user_agent: default_user_agent(),
            timeout: default_http_timeout(),
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
            bot_token: None,
            timeout: default_http_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AgentryConfig {
    /// Load configuration from a file (supports TOML, YAML, JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            _ => Err(ConfigError::FileParse(
                "Unsupported file format. Use .toml, .yaml, .yml, or .json".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("AGENTRY_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("AGENTRY_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|e| ConfigError::EnvVarParse(format!("AGENTRY_SERVER_PORT: {}", e)))?;
        }

        // GitHub configuration
        if let Ok(token) = env::var("GITHUB_TOKEN") {
            config.github.token = Some(token);
        }
        if let Ok(api_base) = env::var("AGENTRY_GITHUB_API_BASE") {
            config.github.api_base = api_base;
        }
        if let Ok(timeout) = env::var("AGENTRY_GITHUB_TIMEOUT") {
            config.github.timeout =
                Duration::from_secs(timeout.parse().map_err(|e| {
                    ConfigError::EnvVarParse(format!("AGENTRY_GITHUB_TIMEOUT: {}", e))
                })?);
        }

        // Slack configuration
        if let Ok(token) = env::var("SLACK_BOT_TOKEN") {
            config.slack.bot_token = Some(token);
        }
        if let Ok(api_base) = env::var("AGENTRY_SLACK_API_BASE") {
            config.slack.api_base = api_base;
        }
        if let Ok(timeout) = env::var("AGENTRY_SLACK_TIMEOUT") {
            config.slack.timeout =
                Duration::from_secs(timeout.parse().map_err(|e| {
                    ConfigError::EnvVarParse(format!("AGENTRY_SLACK_TIMEOUT: {}", e))
                })?);
        }

        // Logging configuration
        if let Ok(level) = env::var("AGENTRY_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("AGENTRY_LOG_JSON") {
            config.logging.json = json == "true";
        }

        Ok(config)
    }

    /// Merge configuration with environment variable overrides
    pub fn merge_with_env(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Environment takes precedence over file values
        if env::var("AGENTRY_SERVER_HOST").is_ok() {
            self.server.host = env_config.server.host;
        }
        if env::var("AGENTRY_SERVER_PORT").is_ok() {
            self.server.port = env_config.server.port;
        }
        if env::var("GITHUB_TOKEN").is_ok() {
            self.github.token = env_config.github.token;
        }
        if env::var("AGENTRY_GITHUB_API_BASE").is_ok() {
            self.github.api_base = env_config.github.api_base;
        }
        if env::var("AGENTRY_GITHUB_TIMEOUT").is_ok() {
            self.github.timeout = env_config.github.timeout;
        }
        if env::var("SLACK_BOT_TOKEN").is_ok() {
            self.slack.bot_token = env_config.slack.bot_token;
        }
        if env::var("AGENTRY_SLACK_API_BASE").is_ok() {
            self.slack.api_base = env_config.slack.api_base;
        }
        if env::var("AGENTRY_SLACK_TIMEOUT").is_ok() {
            self.slack.timeout = env_config.slack.timeout;
        }
        if env::var("AGENTRY_LOG_LEVEL").is_ok() {
            self.logging.level = env_config.logging.level;
        }
        if env::var("AGENTRY_LOG_JSON").is_ok() {
            self.logging.json = env_config.logging.json;
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Validation(
                "Server host cannot be empty".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if !self.github.api_base.starts_with("http") {
            return Err(ConfigError::Validation(
                "GitHub API base must be an http(s) URL".to_string(),
            ));
        }
        if self.github.timeout.as_secs() == 0 {
            return Err(ConfigError::Validation(
                "GitHub timeout must be greater than 0".to_string(),
            ));
        }

        if !self.slack.api_base.starts_with("http") {
            return Err(ConfigError::Validation(
                "Slack API base must be an http(s) URL".to_string(),
            ));
        }
        if self.slack.timeout.as_secs() == 0 {
            return Err(ConfigError::Validation(
                "Slack timeout must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.is_empty() {
            return Err(ConfigError::Validation(
                "Log level cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Custom serialization for Duration as seconds
mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Default value functions for serde
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_user_agent() -> String {
    format!("agentry/{}", env!("CARGO_PKG_VERSION"))
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests that mutate process environment variables must not interleave.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = AgentryConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert!(config.github.token.is_none());
        assert_eq!(config.slack.api_base, "https://slack.com/api");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AgentryConfig::default();
        assert!(config.validate().is_ok());

        config.server.port = 0;
        assert!(config.validate().is_err());

        config = AgentryConfig::default();
        config.github.api_base = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config = AgentryConfig::default();
        config.slack.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_config_loading() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 9000

[github]
api_base = "https://github.internal/api/v3"
token = "ghp_test"
timeout = 10

[slack]
bot_token = "xoxb-test"

[logging]
level = "debug"
json = true
"#;

        let temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        std::fs::write(temp_file.path(), toml_content).unwrap();

        let config = AgentryConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.github.api_base, "https://github.internal/api/v3");
        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert_eq!(config.github.timeout, Duration::from_secs(10));
        // Unset fields keep their defaults
        assert_eq!(config.slack.api_base, "https://slack.com/api");
        assert_eq!(config.slack.bot_token.as_deref(), Some("xoxb-test"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_json_config_loading() {
        let json_content = r#"{"server": {"port": 3000}}"#;

        let temp_file = NamedTempFile::with_suffix(".json").unwrap();
        std::fs::write(temp_file.path(), json_content).unwrap();

        let config = AgentryConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let temp_file = NamedTempFile::with_suffix(".ini").unwrap();
        std::fs::write(temp_file.path(), "port=1").unwrap();
        assert!(AgentryConfig::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_var_loading() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("AGENTRY_SERVER_HOST", "10.0.0.1");
        std::env::set_var("AGENTRY_GITHUB_TIMEOUT", "5");

        let config = AgentryConfig::from_env().unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.github.timeout, Duration::from_secs(5));

        // Clean up
        std::env::remove_var("AGENTRY_SERVER_HOST");
        std::env::remove_var("AGENTRY_GITHUB_TIMEOUT");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("AGENTRY_LOG_LEVEL", "trace");

        let config = AgentryConfig {
            logging: LoggingConfig {
                level: "warn".to_string(),
                json: false,
            },
            ..Default::default()
        };
        let merged = config.merge_with_env().unwrap();
        assert_eq!(merged.logging.level, "trace");

        // Clean up
        std::env::remove_var("AGENTRY_LOG_LEVEL");
    }

    #[test]
    fn test_invalid_env_value_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("AGENTRY_SLACK_TIMEOUT", "not-a-number");
        let result = AgentryConfig::from_env();
        std::env::remove_var("AGENTRY_SLACK_TIMEOUT");
        assert!(matches!(result, Err(ConfigError::EnvVarParse(_))));
    }
}

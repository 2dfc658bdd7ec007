use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Runtime configuration, read from the environment (and a `.env` file if present)
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the JSON store lives
    pub store_path: PathBuf,
    /// Slack webhook used when a rule has no integrations of its own
    pub fallback_webhook_url: Option<String>,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let store_path = std::env::var("SEMPREP_STORE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_store_path);

        let fallback_webhook_url = std::env::var("SLACK_TASK_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let http_timeout = match std::env::var("SEMPREP_HTTP_TIMEOUT_SECS") {
            Ok(value) => parse_timeout(&value)?,
            Err(_) => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            store_path,
            fallback_webhook_url,
            http_timeout,
        })
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("semprep")
        .join("store.json")
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidNumber {
            name: "SEMPREP_HTTP_TIMEOUT_SECS",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("15").unwrap(), Duration::from_secs(15));
        assert!(matches!(
            parse_timeout("0"),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_timeout("soon"),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_default_store_path_ends_with_store_file() {
        let path = default_store_path();
        assert!(path.ends_with("semprep/store.json"));
    }
}

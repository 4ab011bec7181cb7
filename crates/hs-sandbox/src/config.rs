//! Worker launch configuration.
//!
//! The worker's only trusted input is its first process argument, a JSON
//! object naming the control server port and the process token.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long the worker waits for the control connection to open.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration argument")]
    Missing,
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("the token is empty")]
    EmptyToken,
    #[error("the token contains an invalid character: {0:?}")]
    InvalidToken(char),
    #[error("the control server port must not be 0")]
    InvalidPort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub control_server_port: u16,
    pub token: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Log every request to stderr.
    #[serde(default)]
    pub verbose: bool,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl WorkerConfig {
    pub fn new(control_server_port: u16, token: impl Into<String>) -> Self {
        Self {
            control_server_port,
            token: token.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            verbose: false,
        }
    }

    /// Read the configuration from the first process argument.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        let arg = args.nth(1).ok_or(ConfigError::Missing)?;
        Self::from_json(&arg)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The token ends up verbatim in the control URL's query string, so it
    /// is limited to URL-safe characters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_server_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.token.is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        match self
            .token
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            Some(c) => Err(ConfigError::InvalidToken(c)),
            None => Ok(()),
        }
    }

    pub fn control_url(&self) -> String {
        format!(
            "ws://localhost:{}/?token={}",
            self.control_server_port, self.token
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_from_json_defaults() {
        let config = WorkerConfig::from_json(r#"{"controlServerPort": 8305, "token": "abc-123"}"#)
            .unwrap();
        assert_eq!(config, WorkerConfig::new(8305, "abc-123"));
        assert_eq!(config.connect_timeout(), Duration::from_millis(100));
        assert_eq!(config.control_url(), "ws://localhost:8305/?token=abc-123");
    }

    #[test]
    fn test_from_json_overrides() {
        let config = WorkerConfig::from_json(
            r#"{"controlServerPort": 1, "token": "t", "connectTimeoutMs": 250, "verbose": true}"#,
        )
        .unwrap();
        assert_eq!(config.connect_timeout_ms, 250);
        assert!(config.verbose);
    }

    #[test]
    fn test_round_trips_through_the_launch_argument() {
        let config = WorkerConfig::new(4000, "f00d");
        let json = config.to_json().unwrap();
        let parsed = WorkerConfig::from_args(args(&["hs-worker", &json])).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(matches!(
            WorkerConfig::from_args(args(&["hs-worker"])),
            Err(ConfigError::Missing)
        ));
        assert!(matches!(
            WorkerConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            WorkerConfig::from_json(r#"{"controlServerPort": 1, "token": ""}"#),
            Err(ConfigError::EmptyToken)
        ));
        assert!(matches!(
            WorkerConfig::from_json(r#"{"controlServerPort": 1, "token": "a&b"}"#),
            Err(ConfigError::InvalidToken('&'))
        ));
        assert!(matches!(
            WorkerConfig::from_json(r#"{"controlServerPort": 0, "token": "a"}"#),
            Err(ConfigError::InvalidPort)
        ));
    }
}

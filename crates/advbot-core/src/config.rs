//! Configuration for the process bridge and the remote client
//!
//! Every struct has a `Default` and deserializes with missing fields filled
//! from it, so a config file only needs to name what it changes.

use crate::error::{AdvBotError, Result};
use crate::packer::DEFAULT_MESSAGE_LIMIT;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the child process bridge
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Interpreter binary (default: dfrotz)
    pub program: PathBuf,
    /// Arguments, normally just the story file
    pub args: Vec<String>,
    /// Empty polls tolerated by `read_block` before it gives up (default: 5)
    pub read_retries: u32,
    /// Sleep between empty polls in milliseconds (default: 100)
    pub read_interval_ms: u64,
    /// How long teardown waits for each worker to finish (default: 1000)
    pub join_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dfrotz"),
            args: Vec::new(),
            read_retries: 5,
            read_interval_ms: 100,
            join_timeout_ms: 1000,
        }
    }
}

impl BridgeConfig {
    /// Run `story` under the default interpreter
    pub fn for_story(story: impl Into<String>) -> Self {
        Self {
            args: vec![story.into()],
            ..Default::default()
        }
    }

    /// Run an arbitrary program
    pub fn with_command(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Configuration for the remote client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Maximum message size in characters (default: 265)
    pub message_limit: usize,
    /// Backoff after the service reports a quota violation (default: 15 min)
    pub rate_limit_backoff_secs: u64,
    /// Backoff after a connection, timeout or TLS failure (default: 30 s)
    pub network_backoff_secs: u64,
    /// Backoff after any other failure (default: 60 s)
    pub unexpected_backoff_secs: u64,
    /// Per-request timeout for the HTTP backend (default: 30 s)
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            message_limit: DEFAULT_MESSAGE_LIMIT,
            rate_limit_backoff_secs: 15 * 60,
            network_backoff_secs: 30,
            unexpected_backoff_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    pub fn network_backoff(&self) -> Duration {
        Duration::from_secs(self.network_backoff_secs)
    }

    pub fn unexpected_backoff(&self) -> Duration {
        Duration::from_secs(self.unexpected_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Key bundle for the remote service
///
/// Only `access_token` is used by the HTTP backend; the remaining keys are
/// carried for backends that sign requests themselves.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub access_token_secret: Option<String>,
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
}

impl Credentials {
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// Load a JSON key bundle
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            AdvBotError::Config(format!("Failed to read keys {}: {}", path.display(), e))
        })?;
        let credentials: Credentials = serde_json::from_str(&data)?;
        if credentials.access_token.trim().is_empty() {
            return Err(AdvBotError::Config(format!(
                "No access_token in {}",
                path.display()
            )));
        }
        Ok(credentials)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &redact(&self.access_token_secret))
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &redact(&self.consumer_secret))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn keys_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_defaults() {
        let bridge = BridgeConfig::default();
        assert_eq!(bridge.program, PathBuf::from("dfrotz"));
        assert_eq!(bridge.read_retries, 5);
        assert_eq!(bridge.read_interval(), Duration::from_millis(100));

        let remote = RemoteConfig::default();
        assert_eq!(remote.message_limit, 265);
        assert_eq!(remote.rate_limit_backoff(), Duration::from_secs(900));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"args": ["z8/advent.z8"], "read_retries": 8}"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.args, vec!["z8/advent.z8"]);
        assert_eq!(config.read_retries, 8);
        assert_eq!(config.read_interval_ms, 100);
        assert_eq!(config.program, PathBuf::from("dfrotz"));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let json = r#"{"access_token": "sekrit", "consumer_key": "ck"}"#;
        let credentials: Credentials = serde_json::from_str(json).unwrap();
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("sekrit"));
        assert!(!debug.contains("ck\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_credentials_missing_file() {
        let err = Credentials::from_file(Path::new("/nonexistent/keys.json")).unwrap_err();
        assert!(matches!(err, AdvBotError::Config(_)));
    }

    #[test]
    fn test_credentials_from_file() {
        let file = keys_file(
            r#"{"access_token": "tok", "access_token_secret": "sec", "consumer_key": "ck"}"#,
        );
        let credentials = Credentials::from_file(file.path()).unwrap();
        assert_eq!(credentials.access_token, "tok");
        assert_eq!(credentials.access_token_secret.as_deref(), Some("sec"));
        assert_eq!(credentials.consumer_key.as_deref(), Some("ck"));
        assert_eq!(credentials.consumer_secret, None);
    }

    #[test]
    fn test_credentials_blank_token_rejected() {
        let file = keys_file(r#"{"access_token": "   ", "consumer_key": "ck"}"#);
        let err = Credentials::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AdvBotError::Config(_)), "{:?}", err);
    }

    #[test]
    fn test_credentials_malformed_file() {
        let file = keys_file("{\"access_token\": ");
        let err = Credentials::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AdvBotError::SerializationError(_)), "{:?}", err);
    }
}

//! Client configuration, loaded from TOML.
//!
//! ```toml
//! address = "ws://127.0.0.1:8000/ws"
//! poll_interval_ms = 500
//! ack_timeout_ms = 30000   # 0 waits forever
//! request_id_length = 16
//! session_cookie = "sessionid"
//! ```

use seglink_core::{DEFAULT_REQUEST_ID_LENGTH, SESSION_COOKIE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ADDRESS: &str = "ws://127.0.0.1:8000/ws";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL to connect to.
    pub address: String,
    /// How often a pending request is re-checked.
    pub poll_interval_ms: u64,
    /// Give up on a request after this long. `None` or 0 never gives up.
    pub ack_timeout_ms: Option<u64>,
    pub request_id_length: usize,
    /// Cookie carrying the session token.
    pub session_cookie: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            ack_timeout_ms: Some(DEFAULT_ACK_TIMEOUT_MS),
            request_id_length: DEFAULT_REQUEST_ID_LENGTH,
            session_cookie: SESSION_COOKIE.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.ack_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.request_id_length, 16);
        assert_eq!(config.session_cookie, "sessionid");
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let config = ClientConfig::from_toml_str("ack_timeout_ms = 0").unwrap();
        assert_eq!(config.ack_timeout(), None);
    }

    #[test]
    fn partial_override() {
        let config = ClientConfig::from_toml_str(
            r#"
            address = "ws://nativeplanet.local/ws"
            poll_interval_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.address, "ws://nativeplanet.local/ws");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.request_id_length, 16);
    }

    #[test]
    fn address_override_keeps_other_fields() {
        let config = ClientConfig::from_toml_str("poll_interval_ms = 100")
            .unwrap()
            .with_address("ws://10.0.0.2:8000/ws");
        assert_eq!(config.address, "ws://10.0.0.2:8000/ws");
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "request_id_length = 8").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.request_id_length, 8);
    }

    #[test]
    fn load_missing_file() {
        let err = ClientConfig::load(Path::new("/nonexistent/seglink.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_toml() {
        assert!(ClientConfig::from_toml_str("poll_interval_ms = \"fast\"").is_err());
    }
}

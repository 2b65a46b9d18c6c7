use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::reconnect::ReconnectPolicy;

/// Transport timing knobs. Every field has a production default, so a
/// config file only needs to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Application-level ping cadence while the socket is open
    pub ping_interval_ms: u64,
    /// Wait before the first reconnect attempt; doubles per attempt
    pub reconnect_base_delay_ms: u64,
    /// Reconnect attempts before the transport stays closed
    pub max_reconnect_attempts: u32,
    /// Pause between a token-rotation close and the fresh connect
    pub settle_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 30_000,
            reconnect_base_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            settle_delay_ms: 1_000,
        }
    }
}

impl TransportConfig {
    /// Load configuration from file, falling back to defaults when the
    /// file does not exist
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home_dir.join(".chatlink").join("config.toml")
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: TransportConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(TransportConfig::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home_dir.join(".chatlink").join("config.toml")
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = TransportConfig::load(Some(dir.path().join("absent.toml")))
            .expect("load should succeed");
        assert_eq!(config, TransportConfig::default());
        assert_eq!(config.ping_interval(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ping_interval_ms = 5000\n").expect("write");

        let config = TransportConfig::load(Some(path)).expect("load should succeed");
        assert_eq!(config.ping_interval_ms, 5_000);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.settle_delay_ms, 1_000);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let config = TransportConfig {
            ping_interval_ms: 10_000,
            reconnect_base_delay_ms: 250,
            max_reconnect_attempts: 3,
            settle_delay_ms: 500,
        };
        config.save(Some(path.clone())).expect("save should succeed");

        let loaded = TransportConfig::load(Some(path)).expect("load should succeed");
        assert_eq!(loaded, config);
    }

    #[test]
    fn policy_mirrors_the_reconnect_fields() {
        let config = TransportConfig {
            reconnect_base_delay_ms: 200,
            max_reconnect_attempts: 2,
            ..TransportConfig::default()
        };
        let policy = config.reconnect_policy();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Bridge configuration.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Worker threads executing inbound requests (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// DNS-SD service type advertised and browsed (default: `_proceed._tcp`)
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// Gateway: address the HTTP server binds to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub gateway_bind_address: String,

    /// Gateway: polling interval while waiting for a correlated reply, ms
    #[serde(default = "default_poll_interval")]
    pub gateway_poll_interval_ms: u64,

    /// Gateway: maximum polling cycles before the wait times out
    #[serde(default = "default_poll_cycles")]
    pub gateway_poll_cycles: u32,
}

fn default_workers() -> usize {
    4
}

fn default_service_type() -> String {
    "_proceed._tcp".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_poll_cycles() -> u32 {
    1000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            service_type: default_service_type(),
            gateway_bind_address: default_bind_address(),
            gateway_poll_interval_ms: default_poll_interval(),
            gateway_poll_cycles: default_poll_cycles(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::Io(e.to_string()))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Gateway polling interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.gateway_poll_interval_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(BridgeError::Config("workers cannot be 0".into()));
        }
        if self.service_type.is_empty() {
            return Err(BridgeError::Config("service_type cannot be empty".into()));
        }
        if self.gateway_poll_interval_ms == 0 {
            return Err(BridgeError::Config(
                "gateway_poll_interval_ms cannot be 0".into(),
            ));
        }
        if self.gateway_poll_cycles == 0 {
            return Err(BridgeError::Config(
                "gateway_poll_cycles cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = BridgeConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.service_type, "_proceed._tcp");
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.gateway_poll_cycles, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let config = BridgeConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = BridgeConfig {
            gateway_poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_applies_field_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "workers": 2 }}"#).unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.service_type, "_proceed._tcp");
    }

    #[test]
    fn from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "workers": 0 }}"#).unwrap();
        assert!(BridgeConfig::from_file(file.path()).is_err());
    }
}

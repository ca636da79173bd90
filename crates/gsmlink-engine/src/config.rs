//! Session configuration.
//!
//! All durations are stored in milliseconds so the YAML form stays readable:
//!
//! ```yaml
//! port: "192.168.1.20:4001"
//! baud_rate: 115200
//! response_timeout_ms: 300
//! liveness_period_ms: 30000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Shortest accepted liveness period; smaller values are clamped up.
pub const MIN_LIVENESS_PERIOD_MS: u64 = 1000;

/// How often the worker waits for more of a notification that has started
/// but not finished arriving.
pub const PARTIAL_NOTIFICATION_RETRIES: u32 = 3;

/// Consecutive empty receives tolerated by the multi-receive helpers before
/// they give up with a timeout.
pub const MAX_EMPTY_READS: u32 = 3;

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Port identifier. The TCP link reads it as `host:port`.
    pub port: String,
    /// Baud rate handed to the link.
    pub baud_rate: u32,
    /// Link read timeout; also the pause between partial-notification retries.
    pub response_timeout_ms: u64,
    /// Period of the liveness probe.
    pub liveness_period_ms: u64,
    /// Upper bound of a single `receive()`.
    pub receive_timeout_ms: u64,
    /// Overall bound of the multi-receive helpers.
    pub command_timeout_ms: u64,
    /// How often the worker checks the link for inbound bytes.
    pub poll_interval_ms: u64,
    /// How long `close()` waits for the worker to exit.
    pub shutdown_timeout_ms: u64,
    /// Capacity of each event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            port: "127.0.0.1:7000".to_string(),
            baud_rate: 19200,
            response_timeout_ms: 300,
            liveness_period_ms: 10_000,
            receive_timeout_ms: 2000,
            command_timeout_ms: 30_000,
            poll_interval_ms: 20,
            shutdown_timeout_ms: 2000,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Create a config for the given port with defaults for everything else.
    pub fn new(port: impl Into<String>) -> Self {
        EngineConfig {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Parse a config from YAML text.
    pub fn from_yaml_str(text: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        config.validated()
    }

    /// Load a config from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Set the liveness period.
    pub fn with_liveness_period_ms(mut self, period_ms: u64) -> Self {
        self.liveness_period_ms = period_ms;
        self
    }

    /// Set the response timeout.
    pub fn with_response_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    /// Set the bound of a single receive.
    pub fn with_receive_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.receive_timeout_ms = timeout_ms;
        self
    }

    /// Apply the liveness floor and reject values the engine cannot run with.
    pub fn validated(mut self) -> EngineResult<Self> {
        if self.liveness_period_ms < MIN_LIVENESS_PERIOD_MS {
            warn!(
                requested = self.liveness_period_ms,
                floor = MIN_LIVENESS_PERIOD_MS,
                "Liveness period below floor, clamping"
            );
            self.liveness_period_ms = MIN_LIVENESS_PERIOD_MS;
        }

        let nonzero = [
            ("response_timeout_ms", self.response_timeout_ms),
            ("receive_timeout_ms", self.receive_timeout_ms),
            ("command_timeout_ms", self.command_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
            return Err(EngineError::Config(format!("{} must be greater than zero", name)));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::Config("event_capacity must be greater than zero".to_string()));
        }
        if self.port.is_empty() {
            return Err(EngineError::Config("port must not be empty".to_string()));
        }

        Ok(self)
    }

    /// Link read timeout.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Liveness probe period.
    pub fn liveness_period(&self) -> Duration {
        Duration::from_millis(self.liveness_period_ms)
    }

    /// Bound of a single receive.
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Bound of the multi-receive helpers.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Inbound poll cadence.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Worker join bound on close.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.response_timeout_ms, 300);
        assert_eq!(config.liveness_period_ms, 10_000);
        assert_eq!(config.clone().validated().unwrap(), config);
    }

    #[test]
    fn test_liveness_floor_clamps() {
        let config = EngineConfig::default()
            .with_liveness_period_ms(50)
            .validated()
            .unwrap();
        assert_eq!(config.liveness_period(), Duration::from_millis(MIN_LIVENESS_PERIOD_MS));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = EngineConfig::default().with_receive_timeout_ms(0).validated();
        assert!(matches!(
            result,
            Err(EngineError::Config(msg)) if msg.contains("receive_timeout_ms")
        ));
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = EngineConfig::from_yaml_str(
            "port: \"10.0.0.5:4001\"\nbaud_rate: 115200\nliveness_period_ms: 200\n",
        )
        .unwrap();
        assert_eq!(config.port, "10.0.0.5:4001");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.liveness_period_ms, MIN_LIVENESS_PERIOD_MS);
        assert_eq!(config.response_timeout_ms, 300);
    }

    #[test]
    fn test_from_yaml_invalid() {
        assert!(matches!(
            EngineConfig::from_yaml_str("baud_rate: fast"),
            Err(EngineError::Yaml(_))
        ));
    }
}

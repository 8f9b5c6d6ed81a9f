//! Capture session configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filter::FilterConfig;
use crate::protocol::SetupError;

pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub filter: FilterConfig,
    /// How long a worker waits for the response to a request.
    pub response_timeout_secs: u64,
    /// Flows without traffic for this long are torn down.
    pub idle_timeout_secs: u64,
    /// How often idle flows are looked for.
    pub sweep_interval_secs: u64,
    /// Where diagnostics are written; the temp directory when unset.
    pub diagnostic_log: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            diagnostic_log: None,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), SetupError> {
        self.filter.validate()?;
        if self.sweep_interval_secs == 0 {
            return Err(SetupError::invalid_filter("sweep interval must be positive"));
        }
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.response_timeout(), Duration::from_secs(10));
        assert_eq!(config.idle_timeout(), Duration::from_secs(180));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        config.validate().unwrap();
    }

    #[test]
    fn partial_json() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"filter": {"ip": "10.0.0.1"}, "response_timeout_secs": 3}"#).unwrap();
        assert_eq!(config.response_timeout(), Duration::from_secs(3));
        assert_eq!(config.idle_timeout_secs, DEFAULT_IDLE_TIMEOUT_SECS);
        assert_eq!(config.filter.ip, "10.0.0.1");
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let config = CaptureConfig { sweep_interval_secs: 0, ..CaptureConfig::default() };
        assert!(matches!(config.validate(), Err(SetupError::InvalidFilter { .. })));
    }
}

//! Timeout configuration shared by the network backends.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-operation-class deadlines.
///
/// | Field | Default | Bounds |
/// |---|---|---|
/// | `connect` | 3s | server selection, connection setup and the initial `ping` |
/// | `read` | 5s | single-document reads |
/// | `bulk_read` | 30s | multi-document reads |
/// | `write` | none | write acknowledgement, when set |
///
/// Loadable from any serde format; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect: Duration,
    pub read: Duration,
    pub bulk_read: Duration,
    pub write: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            read: Duration::from_secs(5),
            bulk_read: Duration::from_secs(30),
            write: None,
        }
    }
}

impl TimeoutConfig {
    pub fn with_connect(mut self, timeout: Duration) -> Self {
        self.connect = timeout;
        self
    }

    pub fn with_read(mut self, timeout: Duration) -> Self {
        self.read = timeout;
        self
    }

    pub fn with_bulk_read(mut self, timeout: Duration) -> Self {
        self.bulk_read = timeout;
        self
    }

    pub fn with_write(mut self, timeout: Duration) -> Self {
        self.write = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: TimeoutConfig =
            serde_json::from_str(r#"{ "read": { "secs": 1, "nanos": 0 } }"#).unwrap();

        assert_eq!(config.read, Duration::from_secs(1));
        assert_eq!(config.connect, Duration::from_secs(3));
        assert_eq!(config.write, None);
    }
}

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_heartbeat_secs() -> u64 {
    2
}

fn default_broadcast_capacity() -> usize {
    256
}

/// Runtime configuration for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where durable workflow checkpoints live. `None` picks the platform
    /// default under the user's home directory.
    pub database_path: Option<PathBuf>,
    /// Seconds between worker liveness log lines.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Status broadcast channel capacity; slow subscribers lag past this.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Config {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            heartbeat_secs: default_heartbeat_secs(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_in_on_deserialize() {
        let config: Config = serde_json::from_str(r#"{"database_path": null}"#).unwrap();
        assert_eq!(config.heartbeat_secs, 2);
        assert_eq!(config.broadcast_capacity, 256);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(2));
    }
}

//! Call bridge settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bridge behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Default deadline for host-issued evaluations, in milliseconds.
    /// `0` disables the deadline: a call with no result waits forever.
    pub evaluation_timeout_ms: u64,
    /// Log `[tinyws] Ready!` in the remote console after the first load.
    pub announce_ready: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            evaluation_timeout_ms: 0,
            announce_ready: true,
        }
    }
}

impl BridgeConfig {
    pub fn evaluation_timeout(&self) -> Option<Duration> {
        match self.evaluation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

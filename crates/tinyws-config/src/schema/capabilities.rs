//! Which built-in capabilities are exposed, and their knobs.

use serde::{Deserialize, Serialize};

/// Names of the capabilities shipped with tinyws.
pub const BUILT_IN_CAPABILITIES: &[&str] = &["hello", "systemInfo", "exampleEvent", "clock"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    /// Capabilities registered on every page load, in order.
    pub enabled: Vec<String>,
    pub clock: ClockConfig,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            enabled: BUILT_IN_CAPABILITIES.iter().map(|s| s.to_string()).collect(),
            clock: ClockConfig::default(),
        }
    }
}

impl CapabilitiesConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }
}

/// Background tick source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Milliseconds between `tick` events (valid range: 10-3600000).
    pub interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

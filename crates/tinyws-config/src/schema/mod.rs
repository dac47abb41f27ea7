//! Configuration schema types for tinyws.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod bridge;
mod capabilities;
mod logging;

pub use bridge::*;
pub use capabilities::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TinywsConfig {
    pub bridge: BridgeConfig,
    pub logging: LoggingConfig,
    pub capabilities: CapabilitiesConfig,
}

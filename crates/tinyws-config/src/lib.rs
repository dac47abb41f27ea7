//! tinyws configuration.
//!
//! TOML-based settings for the call bridge, logging and the built-in
//! capabilities. Every section has defaults, so partial files work.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BridgeConfig, CapabilitiesConfig, ClockConfig, LogLevel, LoggingConfig, TinywsConfig,
    BUILT_IN_CAPABILITIES, CONFIG_SCHEMA_VERSION,
};

use std::path::Path;
use tinyws_common::ConfigError;

/// Load config from `path` if given, otherwise from the platform default
/// location, then validate it.
pub fn load_config(path: Option<&Path>) -> Result<TinywsConfig, ConfigError> {
    let config = match path {
        Some(p) => toml_loader::load_from_path(p)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TinywsConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&TinywsConfig::default());
        assert!(json.contains("\"bridge\""));
        assert!(json.contains("\"logging\""));
        assert!(json.contains("\"capabilities\""));
        assert!(json.contains("\"clock\""));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&TinywsConfig::default());
        let parsed: TinywsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.logging.level, LogLevel::Info);
        assert_eq!(parsed.capabilities.clock.interval_ms, 1000);
    }

    #[test]
    fn load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capabilities]\nenabled = [\"nope\"]\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn log_level_directive() {
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
        let parsed: LoggingConfig = toml::from_str("level = \"error\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Error);
    }
}

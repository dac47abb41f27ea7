//! Configuration validation.
//!
//! Each check pushes a message; all problems are reported together in a
//! single `ConfigError`.

mod helpers;

#[cfg(test)]
mod tests;

use crate::schema::{TinywsConfig, BUILT_IN_CAPABILITIES};
use tinyws_common::ConfigError;

use helpers::validate_range;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TinywsConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_bridge(&mut errors, config);
    validate_capabilities(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_bridge(errors: &mut Vec<String>, config: &TinywsConfig) {
    if config.bridge.evaluation_timeout_ms != 0 {
        validate_range(
            errors,
            "bridge.evaluation_timeout_ms",
            config.bridge.evaluation_timeout_ms,
            10,
            86_400_000,
        );
    }
}

fn validate_capabilities(errors: &mut Vec<String>, config: &TinywsConfig) {
    let caps = &config.capabilities;

    for (i, name) in caps.enabled.iter().enumerate() {
        if !BUILT_IN_CAPABILITIES.contains(&name.as_str()) {
            errors.push(format!("capabilities.enabled: unknown capability '{name}'"));
        }
        if caps.enabled[..i].contains(name) {
            errors.push(format!("capabilities.enabled: '{name}' listed twice"));
        }
    }

    validate_range(
        errors,
        "capabilities.clock.interval_ms",
        caps.clock.interval_ms,
        10,
        3_600_000,
    );
}

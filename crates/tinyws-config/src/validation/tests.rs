use super::*;

#[test]
fn default_config_is_valid() {
    assert!(validate(&TinywsConfig::default()).is_ok());
}

#[test]
fn zero_timeout_means_disabled_and_is_valid() {
    let mut config = TinywsConfig::default();
    config.bridge.evaluation_timeout_ms = 0;
    assert!(validate(&config).is_ok());
    assert!(config.bridge.evaluation_timeout().is_none());
}

#[test]
fn tiny_timeout_is_rejected() {
    let mut config = TinywsConfig::default();
    config.bridge.evaluation_timeout_ms = 5;
    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("bridge.evaluation_timeout_ms = 5"));
}

#[test]
fn unknown_capability_is_rejected() {
    let mut config = TinywsConfig::default();
    config.capabilities.enabled.push("x11WindowTree".into());
    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("unknown capability 'x11WindowTree'"));
}

#[test]
fn duplicate_capability_is_rejected() {
    let mut config = TinywsConfig::default();
    config.capabilities.enabled = vec!["hello".into(), "hello".into()];
    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("'hello' listed twice"));
}

#[test]
fn errors_are_collected() {
    let mut config = TinywsConfig::default();
    config.bridge.evaluation_timeout_ms = 1;
    config.capabilities.clock.interval_ms = 0;
    let msg = validate(&config).unwrap_err().to_string();
    assert!(msg.contains("bridge.evaluation_timeout_ms"));
    assert!(msg.contains("capabilities.clock.interval_ms"));
    assert!(msg.contains("; "));
}

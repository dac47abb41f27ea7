//! Default TOML config template with inline documentation comments.

pub(crate) fn default_config_toml() -> &'static str {
    r#"# tinyws configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[bridge]
# Deadline for host-issued evaluations in milliseconds; 0 waits forever.
# evaluation_timeout_ms = 0
# announce_ready = true

[logging]
# level = "info"         # trace, debug, info, warn, error

[capabilities]
# enabled = ["hello", "systemInfo", "exampleEvent", "clock"]

[capabilities.clock]
# interval_ms = 1000     # 10-3600000
"#
}

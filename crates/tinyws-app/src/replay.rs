//! Session replay over the in-memory channel.
//!
//! A transcript is JSON lines, one remote-side event per line:
//!
//! ```text
//! {"type":"load"}
//! {"type":"result","ticket":1,"value":2}
//! {"type":"failure","ticket":2,"message":"SyntaxError"}
//! {"type":"message","channel":"hello","body":{"method":"sayHello","args":["JS"],"callbackId":"c1"}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::io::{BufRead, Write};

use serde::Deserialize;
use tinyws_bridge::{Bridge, MemoryChannel, RequestId};
use tinyws_common::TinywsError;
use tinyws_config::TinywsConfig;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplayEvent {
    Load,
    Message {
        channel: String,
        /// A JSON string is posted as-is; anything else is serialized.
        body: serde_json::Value,
    },
    #[serde(rename = "result")]
    Resolve {
        ticket: u64,
        #[serde(default)]
        value: serde_json::Value,
    },
    #[serde(rename = "failure")]
    Fail { ticket: u64, message: String },
}

impl ReplayEvent {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    fn apply(self, channel: &MemoryChannel) -> bool {
        match self {
            ReplayEvent::Load => channel.load_page(),
            ReplayEvent::Message { channel: name, body } => {
                let body = match body {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                channel.handle().post_message(name, body)
            }
            ReplayEvent::Resolve { ticket, value } => channel.resolve(RequestId(ticket), value),
            ReplayEvent::Fail { ticket, message } => channel.fail(RequestId(ticket), &message),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub scripts: usize,
    pub leaked: usize,
}

/// Run a transcript through a fresh bridge with the configured built-in
/// capabilities, writing each evaluated script to `out` as
/// `#<ticket> <script>`.
pub fn run<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    config: &TinywsConfig,
) -> Result<ReplaySummary, TinywsError> {
    let mut bridge = Bridge::new(&config.bridge, MemoryChannel::new);
    tinyws_capabilities::install(&mut bridge, &config.capabilities)?;

    let mut summary = ReplaySummary::default();
    let mut printed = 0;

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event = ReplayEvent::parse(trimmed)
            .map_err(|e| TinywsError::Other(format!("line {}: {e}", index + 1)))?;
        debug!(line = index + 1, event = ?event, "replaying");
        event.apply(bridge.channel());
        bridge.pump();
        summary.events += 1;

        printed = flush_scripts(&bridge, printed, out)?;
    }

    bridge.pump();
    printed = flush_scripts(&bridge, printed, out)?;
    summary.scripts = printed;

    let leaked = bridge.shutdown();
    for call in &leaked {
        warn!(request_id = %call.id, expression = %call.expression, "never answered");
    }
    summary.leaked = leaked.len();

    info!(
        events = summary.events,
        scripts = summary.scripts,
        leaked = summary.leaked,
        "replay finished"
    );
    Ok(summary)
}

fn flush_scripts<W: Write>(
    bridge: &Bridge<MemoryChannel>,
    from: usize,
    out: &mut W,
) -> Result<usize, TinywsError> {
    let scripts = bridge.channel().scripts();
    for s in &scripts[from..] {
        writeln!(out, "#{} {}", s.ticket, s.script)?;
    }
    Ok(scripts.len())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tinyws_config::BridgeConfig;

    use super::*;

    fn quiet_config() -> TinywsConfig {
        TinywsConfig {
            bridge: BridgeConfig {
                announce_ready: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn replay(transcript: &str, config: &TinywsConfig) -> (ReplaySummary, String) {
        let mut out = Vec::new();
        let summary = run(Cursor::new(transcript), &mut out, config).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parse_each_event_type() {
        assert_eq!(ReplayEvent::parse(r#"{"type":"load"}"#).unwrap(), ReplayEvent::Load);
        assert_eq!(
            ReplayEvent::parse(r#"{"type":"result","ticket":4}"#).unwrap(),
            ReplayEvent::Resolve {
                ticket: 4,
                value: serde_json::Value::Null
            }
        );
        assert_eq!(
            ReplayEvent::parse(r#"{"type":"failure","ticket":1,"message":"x"}"#).unwrap(),
            ReplayEvent::Fail {
                ticket: 1,
                message: "x".into()
            }
        );
        assert!(ReplayEvent::parse(r#"{"type":"reload"}"#).is_err());
    }

    #[test]
    fn load_installs_bootstrap_and_every_proxy() {
        let (summary, out) = replay(r#"{"type":"load"}"#, &quiet_config());
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("#0 [0, ((() => {"));
        assert!(lines[1].starts_with("#1 "));
        assert!(lines[1].contains(r#""name":"hello""#));
        assert!(lines[4].contains(r#""name":"clock""#));
        assert_eq!(summary.events, 1);
        assert_eq!(summary.scripts, 5);
        // Nothing was acknowledged.
        assert_eq!(summary.leaked, 5);
    }

    #[test]
    fn full_call_round_trip() {
        let transcript = r#"
# page comes up, hello proxy confirmed
{"type":"load"}
{"type":"result","ticket":0,"value":true}
{"type":"result","ticket":1,"value":3}
{"type":"message","channel":"hello","body":{"method":"sayHello","args":["JS"],"callbackId":"c1"}}
"#;
        let mut config = quiet_config();
        config.capabilities.enabled = vec!["hello".into()];
        let (summary, out) = replay(transcript, &config);

        let last = out.lines().last().unwrap();
        assert_eq!(
            last,
            r#"#2 [2, (window.__tinyws.respond("hello", "c1", {"result":null}))]"#
        );
        assert_eq!(summary.events, 4);
        assert_eq!(summary.leaked, 1);
    }

    #[test]
    fn string_bodies_are_posted_verbatim() {
        let transcript = r#"{"type":"load"}
{"type":"result","ticket":1,"value":3}
{"type":"message","channel":"hello","body":"{\"method\":\"nope\",\"callbackId\":\"c9\"}"}
"#;
        let mut config = quiet_config();
        config.capabilities.enabled = vec!["hello".into()];
        let (_, out) = replay(transcript, &config);
        assert!(out.contains(r#"{"error":"method not found: hello.nope"}"#));
    }

    #[test]
    fn bad_line_reports_its_number() {
        let mut out = Vec::new();
        let err = run(
            Cursor::new("{\"type\":\"load\"}\nnot json\n"),
            &mut out,
            &quiet_config(),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("line 2:"));
    }
}

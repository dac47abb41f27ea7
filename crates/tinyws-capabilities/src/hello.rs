//! `hello`: the smallest useful capability.

use tinyws_bridge::{Args, CallContext, Capability, Exports, Value};
use tinyws_common::{BridgeError, Result};

pub const NAME: &str = "hello";

#[derive(Debug, Default)]
pub struct Hello;

impl Hello {
    pub fn new() -> Self {
        Self
    }

    /// Milliseconds since the Unix epoch, with sub-millisecond precision.
    fn get_timestamp(&mut self, _cx: &mut CallContext<'_, '_>, _args: Args) -> Result<Value> {
        let micros = chrono::Utc::now().timestamp_micros();
        Ok(Value::Float(micros as f64 / 1000.0))
    }

    fn pprint(&mut self, _cx: &mut CallContext<'_, '_>, args: Args) -> Result<Value> {
        let json = args.get(0).to_json()?;
        let text = serde_json::to_string_pretty(&json)
            .map_err(|e| BridgeError::UnsupportedValue(e.to_string()))?;
        println!("{text}");
        Ok(Value::Absent)
    }

    fn say_hello(&mut self, _cx: &mut CallContext<'_, '_>, args: Args) -> Result<Value> {
        println!("{}", greeting(args.str(0)?));
        Ok(Value::Absent)
    }
}

fn greeting(from: &str) -> String {
    format!("Hello from {from}")
}

impl Capability for Hello {
    fn name(&self) -> &str {
        NAME
    }

    fn exports(&self) -> Exports<Self> {
        Exports::new()
            .method("getTimestamp", Hello::get_timestamp)
            .method("pprint", Hello::pprint)
            .method("sayHello", Hello::say_hello)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{loaded_bridge, response_for};

    #[test]
    fn greeting_text() {
        assert_eq!(greeting("JS"), "Hello from JS");
    }

    #[test]
    fn say_hello_resolves_with_null() {
        let mut bridge = loaded_bridge(Hello::new());
        bridge
            .channel()
            .call_with_token("hello", "sayHello", json!(["JS"]), "abc");
        bridge.pump();
        assert!(response_for(&bridge, "abc")
            .unwrap()
            .contains(r#"{"result":null}"#));
    }

    #[test]
    fn say_hello_needs_a_name() {
        let mut bridge = loaded_bridge(Hello::new());
        bridge.channel().call_with_token("hello", "sayHello", json!([]), "abc");
        bridge.pump();
        assert!(response_for(&bridge, "abc")
            .unwrap()
            .contains("expected string, got absent"));
    }

    #[test]
    fn timestamp_is_close_to_now() {
        let mut bridge = loaded_bridge(Hello::new());
        let before = chrono::Utc::now().timestamp_millis() as f64;
        bridge
            .channel()
            .call_with_token("hello", "getTimestamp", json!([]), "t");
        bridge.pump();

        let script = response_for(&bridge, "t").unwrap();
        let start = script.find("\"result\":").unwrap() + "\"result\":".len();
        let end = script[start..].find('}').unwrap() + start;
        let ts: f64 = script[start..end].parse().unwrap();
        assert!(ts >= before - 1.0);
        assert!(ts - before < 60_000.0);
    }

    #[test]
    fn pprint_accepts_any_value() {
        let mut bridge = loaded_bridge(Hello::new());
        bridge
            .channel()
            .call_with_token("hello", "pprint", json!([{ "a": [1, 2] }]), "p");
        bridge.pump();
        assert!(response_for(&bridge, "p")
            .unwrap()
            .contains(r#"{"result":null}"#));
    }
}

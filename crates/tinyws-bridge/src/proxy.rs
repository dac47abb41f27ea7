//! Remote-side proxy construction.
//!
//! The bootstrap script installs one reusable routine set under
//! `window.__tinyws`. Capabilities are then described as plain data
//! ([`ProxyDescriptor`]) and built remotely by `defineCapability`, so no
//! per-capability source text is generated. Every script here is a single
//! expression, because the correlator wraps it as `[id, (script)]`.

use serde::Serialize;
use tinyws_common::{BridgeError, Result};

use crate::value::Value;

/// Installs `window.__tinyws` and resets `window.capabilities`.
///
/// Exported methods become promise-returning stubs: each call mints a
/// callback token, parks `{resolve, reject}` under
/// `window.capabilities[name].__callbacks[token]`, and posts
/// `{method, args, callbackId}` on the capability's channel. The host
/// answers through `respond`, which settles and deletes the entry, so a
/// token is only ever used once.
pub const BOOTSTRAP_SCRIPT: &str = r#"(() => {
    const tinyws = window.__tinyws = window.__tinyws ?? { functions: {}, nextFunction: 0 };

    tinyws.wrap = (value) => {
        if (typeof value === "function") {
            const handle = "fn" + (tinyws.nextFunction++);
            tinyws.functions[handle] = value;
            return { "$tinyws_fn": handle };
        }
        if (Array.isArray(value)) {
            return value.map(tinyws.wrap);
        }
        if (value !== null && typeof value === "object") {
            const out = {};
            for (const [k, v] of Object.entries(value)) {
                out[k] = tinyws.wrap(v);
            }
            return out;
        }
        return value === undefined ? null : value;
    };

    tinyws.post = (channel, message) => {
        const body = JSON.stringify(tinyws.wrap(message));
        const handlers = window.webkit && window.webkit.messageHandlers;
        if (handlers && handlers[channel]) {
            handlers[channel].postMessage(body);
        } else {
            window.ipc.postMessage(JSON.stringify({ channel: channel, body: body }));
        }
    };

    tinyws.defineCapability = (desc) => {
        const name = desc.name;
        const cap = { __callbacks: {} };
        for (const method of desc.methods) {
            cap[method] = (...args) => new Promise((resolve, reject) => {
                const callbackId = crypto.randomUUID();
                cap.__callbacks[callbackId] = { resolve: resolve, reject: reject };
                tinyws.post(name, { method: method, args: args, callbackId: callbackId });
            });
        }
        if (desc.events) {
            const target = new EventTarget();
            const ids = new WeakMap();
            const track = cap.addEventListener;
            const untrack = cap.removeEventListener;
            cap.eventTarget = target;
            cap.addEventListener = (type, listener) => {
                if (!ids.has(listener)) {
                    ids.set(listener, crypto.randomUUID());
                }
                target.addEventListener(type, listener);
                return track ? track(type, ids.get(listener)) : Promise.resolve(null);
            };
            cap.removeEventListener = (type, listener) => {
                target.removeEventListener(type, listener);
                const id = ids.get(listener);
                return untrack && id ? untrack(type, id) : Promise.resolve(null);
            };
        }
        window.capabilities = window.capabilities ?? {};
        window.capabilities[name] = cap;
        console.log(`[tinyws] Capability ${name} was successfully loaded!`);
        return desc.methods.length;
    };

    tinyws.respond = (name, callbackId, response) => {
        const cap = window.capabilities[name];
        const callback = cap && cap.__callbacks[callbackId];
        if (!callback) {
            return false;
        }
        delete cap.__callbacks[callbackId];
        if (response.error !== undefined && response.error !== null) {
            callback.reject(response.error);
        } else {
            callback.resolve(response.result);
        }
        return true;
    };

    tinyws.emit = (name, type, detail) => {
        const cap = window.capabilities[name];
        if (!cap || !cap.eventTarget) {
            return false;
        }
        return cap.eventTarget.dispatchEvent(new CustomEvent(type, { detail: detail }));
    };

    tinyws.invoke = (handle, args) => {
        const fn = tinyws.functions[handle];
        if (!fn) {
            throw new Error(`unknown function handle ${handle}`);
        }
        return tinyws.wrap(fn(...args));
    };

    tinyws.release = (handle) => delete tinyws.functions[handle];

    window.capabilities = {};
    return true;
})()"#;

/// One-time greeting logged in the remote console.
pub const READY_SCRIPT: &str = "console.log(`[tinyws] Ready!`)";

/// Data handed to `defineCapability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyDescriptor {
    pub name: String,
    pub methods: Vec<String>,
    /// Whether the capability gets an `EventTarget`.
    pub events: bool,
}

impl ProxyDescriptor {
    pub fn script(&self) -> Result<String> {
        Ok(format!("window.__tinyws.defineCapability({})", to_js(self)?))
    }
}

/// Answer to one inbound call. Exactly one of result/error reaches the
/// remote side.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Resolve(Value),
    Reject(String),
}

impl Response {
    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Response::Resolve(v) => {
                let result = v.to_json()?;
                serde_json::json!({ "result": result })
            }
            Response::Reject(msg) => serde_json::json!({ "error": msg }),
        })
    }
}

/// Settle `window.capabilities[capability].__callbacks[callback_id]`.
pub fn respond_script(capability: &str, callback_id: &str, response: &Response) -> Result<String> {
    Ok(format!(
        "window.__tinyws.respond({}, {}, {})",
        to_js(capability)?,
        to_js(callback_id)?,
        to_js(&response.to_json()?)?
    ))
}

/// Dispatch a `CustomEvent` on the capability's remote event target.
pub fn emit_script(capability: &str, event_type: &str, detail: &Value) -> Result<String> {
    Ok(format!(
        "window.__tinyws.emit({}, {}, {})",
        to_js(capability)?,
        to_js(event_type)?,
        to_js(&detail.to_json()?)?
    ))
}

/// Call a remote function by handle.
pub fn invoke_script(handle: &str, args: &[Value]) -> Result<String> {
    let args = args
        .iter()
        .map(Value::to_json)
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "window.__tinyws.invoke({}, {})",
        to_js(handle)?,
        to_js(&args)?
    ))
}

/// Drop the remote side's reference to a function.
pub fn release_script(handle: &str) -> Result<String> {
    Ok(format!("window.__tinyws.release({})", to_js(handle)?))
}

/// JSON text is a valid script literal for everything we embed.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| BridgeError::UnsupportedValue(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_script_is_data_not_code() {
        let desc = ProxyDescriptor {
            name: "hello".into(),
            methods: vec!["sayHello".into(), "getTimestamp".into()],
            events: false,
        };
        assert_eq!(
            desc.script().unwrap(),
            r#"window.__tinyws.defineCapability({"name":"hello","methods":["sayHello","getTimestamp"],"events":false})"#
        );
    }

    #[test]
    fn respond_script_resolves() {
        let script =
            respond_script("hello", "abc", &Response::Resolve(Value::Int(3))).unwrap();
        assert_eq!(
            script,
            r#"window.__tinyws.respond("hello", "abc", {"result":3})"#
        );
    }

    #[test]
    fn respond_script_rejects() {
        let script = respond_script("hello", "abc", &Response::Reject("boom".into())).unwrap();
        assert_eq!(
            script,
            r#"window.__tinyws.respond("hello", "abc", {"error":"boom"})"#
        );
    }

    #[test]
    fn names_are_escaped() {
        let script = emit_script("we\"ird", "</script>", &Value::Absent).unwrap();
        assert_eq!(
            script,
            r#"window.__tinyws.emit("we\"ird", "</script>", null)"#
        );
    }

    #[test]
    fn unsupported_detail_fails_locally() {
        let err = emit_script("clock", "tick", &Value::Float(f64::NAN)).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedValue(_)));
    }

    #[test]
    fn invoke_and_release_scripts() {
        assert_eq!(
            invoke_script("fn0", &[Value::Int(1), Value::from("a")]).unwrap(),
            r#"window.__tinyws.invoke("fn0", [1,"a"])"#
        );
        assert_eq!(
            release_script("fn0").unwrap(),
            r#"window.__tinyws.release("fn0")"#
        );
    }

    #[test]
    fn bootstrap_is_a_single_expression() {
        assert!(BOOTSTRAP_SCRIPT.starts_with("(() => {"));
        assert!(BOOTSTRAP_SCRIPT.ends_with("})()"));
        assert!(BOOTSTRAP_SCRIPT.contains("window.capabilities = {};"));
        assert!(BOOTSTRAP_SCRIPT.contains(crate::value::FUNCTION_TAG));
    }
}

//! In-memory primitive channel.
//!
//! Records every script the bridge evaluates and every channel it binds,
//! and lets the caller play the remote side through the bridge's handle.
//! Used by headless hosts (session replay) and by tests.

use serde_json::json;
use tinyws_common::{new_callback_token, BridgeError, Result};

use crate::channel::{BridgeHandle, PrimitiveChannel, RequestId};

/// One script handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedScript {
    pub ticket: RequestId,
    pub script: String,
}

pub struct MemoryChannel {
    handle: BridgeHandle,
    scripts: Vec<EvaluatedScript>,
    bound: Vec<String>,
    acknowledged: usize,
    closed: bool,
}

impl MemoryChannel {
    pub fn new(handle: BridgeHandle) -> Self {
        Self {
            handle,
            scripts: Vec::new(),
            bound: Vec::new(),
            acknowledged: 0,
            closed: false,
        }
    }

    pub fn handle(&self) -> &BridgeHandle {
        &self.handle
    }

    /// Everything evaluated so far, in order.
    pub fn scripts(&self) -> &[EvaluatedScript] {
        &self.scripts
    }

    pub fn last_script(&self) -> Option<&EvaluatedScript> {
        self.scripts.last()
    }

    /// Scripts containing `needle`.
    pub fn scripts_containing<'s>(
        &'s self,
        needle: &'s str,
    ) -> impl Iterator<Item = &'s EvaluatedScript> + 's {
        self.scripts.iter().filter(move |s| s.script.contains(needle))
    }

    pub fn bound_channels(&self) -> &[String] {
        &self.bound
    }

    /// Make further evaluations fail at hand-off.
    pub fn close(&mut self) {
        self.closed = true;
    }

    // --- remote side -------------------------------------------------------

    /// Deliver `value` as the result of `ticket`.
    pub fn resolve(&self, ticket: RequestId, value: serde_json::Value) -> bool {
        self.handle
            .deliver_result(ticket, json!([ticket.0, value]).to_string())
    }

    /// Report that `ticket` raised `message`.
    pub fn fail(&self, ticket: RequestId, message: &str) -> bool {
        self.handle.deliver_failure(ticket, message)
    }

    /// Resolve, with `null`, every script not yet acknowledged this way.
    /// Returns how many were acknowledged.
    pub fn acknowledge_all(&mut self) -> usize {
        let fresh = &self.scripts[self.acknowledged..];
        for s in fresh {
            self.handle
                .deliver_result(s.ticket, json!([s.ticket.0, null]).to_string());
        }
        let count = fresh.len();
        self.acknowledged = self.scripts.len();
        count
    }

    /// Post a call the way a capability proxy does. Returns the token.
    pub fn call(&self, capability: &str, method: &str, args: serde_json::Value) -> String {
        let token = new_callback_token();
        self.call_with_token(capability, method, args, &token);
        token
    }

    pub fn call_with_token(
        &self,
        capability: &str,
        method: &str,
        args: serde_json::Value,
        token: &str,
    ) -> bool {
        let body = json!({ "method": method, "args": args, "callbackId": token });
        self.handle.post_message(capability, body.to_string())
    }

    pub fn load_page(&self) -> bool {
        self.handle.page_loaded()
    }
}

impl PrimitiveChannel for MemoryChannel {
    fn evaluate(&mut self, ticket: RequestId, script: &str) -> Result<()> {
        if self.closed {
            return Err(BridgeError::Channel("memory channel closed".into()));
        }
        self.scripts.push(EvaluatedScript {
            ticket,
            script: script.to_string(),
        });
        Ok(())
    }

    fn bind_message_channel(&mut self, name: &str) -> Result<()> {
        if self.closed {
            return Err(BridgeError::Channel("memory channel closed".into()));
        }
        self.bound.push(name.to_string());
        Ok(())
    }
}

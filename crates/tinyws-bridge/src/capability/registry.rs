use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};

use serde::Deserialize;
use tinyws_common::{BridgeError, Result};
use tracing::{debug, error, info, warn};

use crate::channel::BridgeEvent;
use crate::proxy::{self, ProxyDescriptor, Response};
use crate::remote::Remote;
use crate::value::Value;

use super::{Args, CallContext, Capability, Handler};

/// Lifecycle of one capability on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    /// Not exposed remotely (never registered, or its proxy failed).
    Unregistered,
    /// Channel bound, proxy definition sent but not yet confirmed. Calls
    /// arriving now are queued.
    Registering,
    /// Proxy live; calls are dispatched.
    Active,
}

/// A call posted by the remote side: `{method, args, callbackId}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCallRequest {
    pub method: String,
    pub args: Args,
    pub callback_id: String,
}

#[derive(Deserialize)]
struct WireCall {
    method: String,
    #[serde(default)]
    args: Option<Vec<serde_json::Value>>,
    #[serde(rename = "callbackId")]
    callback_id: String,
}

impl RemoteCallRequest {
    /// Best-effort read of `callbackId` from a body that failed to parse,
    /// so the caller can still be answered.
    pub fn recover_callback_id(body: &str) -> Option<String> {
        let json: serde_json::Value = serde_json::from_str(body).ok()?;
        json.get("callbackId")?.as_str().map(str::to_string)
    }

    pub fn parse(body: &str) -> Result<Self> {
        let wire: WireCall = serde_json::from_str(body)
            .map_err(|e| BridgeError::InvalidArguments(format!("malformed call: {e}")))?;
        let args = wire
            .args
            .unwrap_or_default()
            .into_iter()
            .map(Value::from_json)
            .collect();
        Ok(Self {
            method: wire.method,
            args: Args::new(args),
            callback_id: wire.callback_id,
        })
    }
}

/// Type-erased view of a registered capability.
trait ExportTable {
    fn name(&self) -> &str;
    fn methods(&self) -> &[&'static str];
    fn emits_events(&mut self) -> bool;
    fn invoke(
        &mut self,
        method: &str,
        args: Args,
        cx: &mut CallContext<'_, '_>,
    ) -> Option<Result<Value>>;
    fn reset_listeners(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Slot<C> {
    capability: C,
    name: String,
    order: Vec<&'static str>,
    handlers: HashMap<&'static str, Handler<C>>,
}

impl<C: Capability> ExportTable for Slot<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn methods(&self) -> &[&'static str] {
        &self.order
    }

    fn emits_events(&mut self) -> bool {
        self.capability.event_source().is_some()
    }

    fn invoke(
        &mut self,
        method: &str,
        args: Args,
        cx: &mut CallContext<'_, '_>,
    ) -> Option<Result<Value>> {
        let handler = self.handlers.get(method)?;
        Some(handler(&mut self.capability, cx, args))
    }

    fn reset_listeners(&mut self) {
        if let Some(source) = self.capability.event_source() {
            source.clear();
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.capability
    }
}

/// How many answered callback tokens are remembered per capability.
pub(super) const ANSWERED_WINDOW: usize = 1024;

/// Recently answered callback tokens, oldest evicted first.
///
/// The remote side deletes a callback once it is settled, so a repeated
/// token can only be a late duplicate of a recent call.
#[derive(Default)]
pub(super) struct AnsweredTokens {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl AnsweredTokens {
    pub(super) fn contains(&self, token: &str) -> bool {
        self.seen.contains(token)
    }

    pub(super) fn insert(&mut self, token: &str) {
        if !self.seen.insert(token.to_string()) {
            return;
        }
        self.order.push_back(token.to_string());
        if self.order.len() > ANSWERED_WINDOW {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }

    pub(super) fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

struct Entry {
    table: Box<dyn ExportTable>,
    state: CapabilityState,
    bound: bool,
    generation: u64,
    backlog: Vec<RemoteCallRequest>,
    answered: AnsweredTokens,
}

/// Owns every capability of one bridge, their method tables and their
/// per-page call state.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Vec<Entry>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the method table for `capability`. Its export list is read
    /// once, here, and never changes afterwards.
    pub fn add<C: Capability>(&mut self, capability: C) -> Result<()> {
        let name = capability.name().to_string();
        if self.find(&name).is_some() {
            return Err(BridgeError::DuplicateCapability(name));
        }

        let exports = capability.exports();
        let mut order = Vec::with_capacity(exports.entries.len());
        let mut handlers = HashMap::with_capacity(exports.entries.len());
        for export in exports.entries {
            if handlers.insert(export.name, export.handler).is_some() {
                return Err(BridgeError::DuplicateMethod {
                    capability: name,
                    method: export.name.to_string(),
                });
            }
            order.push(export.name);
        }

        debug!(capability = %name, methods = order.len(), "capability added");
        self.entries.push(Entry {
            table: Box::new(Slot {
                capability,
                name,
                order,
                handlers,
            }),
            state: CapabilityState::Unregistered,
            bound: false,
            generation: 0,
            backlog: Vec::new(),
            answered: AnsweredTokens::default(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.table.name())
    }

    pub fn state(&self, name: &str) -> Option<CapabilityState> {
        self.find(name).map(|e| e.state)
    }

    pub fn methods(&self, name: &str) -> Option<&[&'static str]> {
        self.find(name).map(|e| e.table.methods())
    }

    pub fn emits_events(&mut self, name: &str) -> Option<bool> {
        self.find_mut(name).map(|e| e.table.emits_events())
    }

    /// Typed access to a registered capability.
    pub fn get_mut<C: Capability>(&mut self, name: &str) -> Option<&mut C> {
        self.find_mut(name)?.table.as_any_mut().downcast_mut::<C>()
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.table.name() == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.table.name() == name)
    }

    /// Expose every capability on the current page.
    pub(crate) fn register_all(&mut self, remote: &mut Remote<'_>) {
        for entry in &mut self.entries {
            if let Err(e) = register_entry(entry, remote) {
                error!(capability = entry.table.name(), error = %e, "failed to register capability");
            }
        }
    }

    pub(crate) fn register(&mut self, name: &str, remote: &mut Remote<'_>) -> Result<()> {
        let entry = self
            .find_mut(name)
            .ok_or_else(|| BridgeError::UnknownCapability(name.to_string()))?;
        register_entry(entry, remote)
    }

    /// The proxy definition for `name` finished evaluating.
    pub(crate) fn activate(
        &mut self,
        name: &str,
        generation: u64,
        outcome: std::result::Result<(), String>,
        remote: &mut Remote<'_>,
    ) {
        let Some(entry) = self.find_mut(name) else {
            warn!(capability = name, "activation for unknown capability");
            return;
        };
        if entry.generation != generation || entry.state != CapabilityState::Registering {
            debug!(capability = name, generation, "stale activation ignored");
            return;
        }

        let backlog = std::mem::take(&mut entry.backlog);
        match outcome {
            Ok(()) => {
                entry.state = CapabilityState::Active;
                info!("Capability '{name}' was successfully loaded!");
                for request in backlog {
                    dispatch(entry, request, remote);
                }
            }
            Err(message) => {
                entry.state = CapabilityState::Unregistered;
                error!(capability = name, error = %message, "remote proxy was not created");
                let reason = BridgeError::Inactive(name.to_string()).to_string();
                for request in backlog {
                    respond(entry, &request.callback_id, Response::Reject(reason.clone()), remote);
                }
            }
        }
    }

    /// Handle a message posted on the channel named `channel`.
    pub(crate) fn on_message(&mut self, channel: &str, body: &str, remote: &mut Remote<'_>) {
        let Some(entry) = self.find_mut(channel) else {
            warn!(channel, "message on unknown channel, discarding");
            return;
        };

        let request = match RemoteCallRequest::parse(body) {
            Ok(r) => r,
            Err(e) => {
                warn!(channel, body_len = body.len(), error = %e, "call rejected: failed to parse");
                match RemoteCallRequest::recover_callback_id(body) {
                    Some(token) if !entry.answered.contains(&token) => {
                        respond(entry, &token, Response::Reject(e.remote_message()), remote);
                    }
                    Some(_) => {}
                    None => debug!(channel, "no callback id to answer, dropping"),
                }
                return;
            }
        };

        match entry.state {
            CapabilityState::Active => dispatch(entry, request, remote),
            CapabilityState::Registering => {
                debug!(
                    capability = channel,
                    method = %request.method,
                    "capability not active yet, call queued"
                );
                entry.backlog.push(request);
            }
            CapabilityState::Unregistered => {
                warn!(capability = channel, method = %request.method, "call for inactive capability");
                let reason = BridgeError::Inactive(channel.to_string()).to_string();
                respond(entry, &request.callback_id, Response::Reject(reason), remote);
            }
        }
    }
}

fn register_entry(entry: &mut Entry, remote: &mut Remote<'_>) -> Result<()> {
    let name = entry.table.name().to_string();

    if !entry.bound {
        remote.channel.bind_message_channel(&name)?;
        entry.bound = true;
    }

    if !entry.backlog.is_empty() {
        warn!(
            capability = %name,
            dropped = entry.backlog.len(),
            "page reloaded with calls still queued, dropping them"
        );
        entry.backlog.clear();
    }
    entry.answered.clear();
    entry.table.reset_listeners();
    entry.generation += 1;
    entry.state = CapabilityState::Registering;

    let descriptor = ProxyDescriptor {
        name: name.clone(),
        methods: entry.table.methods().iter().map(|m| m.to_string()).collect(),
        events: entry.table.emits_events(),
    };
    let script = descriptor.script()?;

    let handle = remote.handle.clone();
    let generation = entry.generation;
    let capability = name.clone();
    let issued = remote.evaluate_then(&script, move |outcome| {
        handle.send(BridgeEvent::ProxyReady {
            capability,
            generation,
            outcome: outcome.map(|_| ()).map_err(|e| e.to_string()),
        });
    });

    if let Err(e) = issued {
        entry.state = CapabilityState::Unregistered;
        return Err(e);
    }
    debug!(capability = %name, generation, "proxy definition sent");
    Ok(())
}

fn dispatch(entry: &mut Entry, request: RemoteCallRequest, remote: &mut Remote<'_>) {
    if entry.answered.contains(&request.callback_id) {
        warn!(
            capability = entry.table.name(),
            callback_id = %request.callback_id,
            "callback id already answered, ignoring"
        );
        return;
    }

    let name = entry.table.name().to_string();
    let outcome = {
        let mut cx = CallContext::new(&name, remote);
        entry.table.invoke(&request.method, request.args, &mut cx)
    };

    let response = match outcome {
        Some(Ok(value)) => Response::Resolve(value),
        Some(Err(e)) => {
            let err = BridgeError::Handler {
                method: request.method.clone(),
                message: e.to_string(),
            };
            error!(capability = %name, method = %request.method, error = %e, "Error in exported method");
            Response::Reject(err.remote_message())
        }
        None => {
            let err = BridgeError::MethodNotFound {
                capability: name.clone(),
                method: request.method.clone(),
            };
            warn!(capability = %name, method = %request.method, "call for unknown method");
            Response::Reject(err.remote_message())
        }
    };

    respond(entry, &request.callback_id, response, remote);
}

fn respond(entry: &mut Entry, callback_id: &str, response: Response, remote: &mut Remote<'_>) {
    let name = entry.table.name();
    let script = match proxy::respond_script(name, callback_id, &response) {
        Ok(s) => s,
        Err(e) => {
            // The result itself could not be encoded; the caller still gets
            // an answer.
            warn!(capability = name, callback_id, error = %e, "result not encodable, rejecting");
            match proxy::respond_script(name, callback_id, &Response::Reject(e.to_string())) {
                Ok(s) => s,
                Err(e) => {
                    error!(capability = name, callback_id, error = %e, "failed to build response");
                    return;
                }
            }
        }
    };

    entry.answered.insert(callback_id);
    if let Err(e) = remote.evaluate_detached(&script) {
        warn!(callback_id, error = %e, "failed to send response");
    }
}

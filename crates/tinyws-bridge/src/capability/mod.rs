//! Capabilities: named groups of host methods callable from the remote side.
//!
//! A capability lists its exported methods up front as a static
//! name -> handler table ([`Exports`]); the registry builds the dispatch
//! table and the remote proxy from that list.

mod registry;


pub use registry::{CapabilityRegistry, CapabilityState, RemoteCallRequest};

use serde::de::DeserializeOwned;
use tinyws_common::{BridgeError, Result};

use crate::channel::RequestId;
use crate::events::{self, EventSource};
use crate::remote::Remote;
use crate::value::Value;

/// An exported method. Gets the capability, the call context and the
/// decoded positional arguments.
pub type Handler<C> = fn(&mut C, &mut CallContext<'_, '_>, Args) -> Result<Value>;

/// Host-side object exposed as `window.capabilities[name]`.
pub trait Capability: 'static {
    fn name(&self) -> &str;

    /// The methods callable from the remote side.
    fn exports(&self) -> Exports<Self>
    where
        Self: Sized;

    /// Listener bookkeeping, for capabilities that emit events.
    fn event_source(&mut self) -> Option<&mut EventSource> {
        None
    }
}

pub struct Export<C> {
    pub(crate) name: &'static str,
    pub(crate) handler: Handler<C>,
}

/// Builder for a capability's export list.
pub struct Exports<C> {
    pub(crate) entries: Vec<Export<C>>,
}

impl<C: Capability> Exports<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn method(mut self, name: &'static str, handler: Handler<C>) -> Self {
        self.entries.push(Export { name, handler });
        self
    }

    /// Add `addEventListener` / `removeEventListener` bookkeeping methods.
    pub fn with_events(self) -> Self {
        self.method("addEventListener", events::add_listener::<C>)
            .method("removeEventListener", events::remove_listener::<C>)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }
}

impl<C: Capability> Default for Exports<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Positional arguments of an inbound call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

static ABSENT: Value = Value::Absent;

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Missing trailing arguments read as `Absent`, like an omitted
    /// parameter on the remote side.
    pub fn get(&self, index: usize) -> &Value {
        self.0.get(index).unwrap_or(&ABSENT)
    }

    pub fn str(&self, index: usize) -> Result<&str> {
        let v = self.get(index);
        v.as_str().ok_or_else(|| {
            BridgeError::InvalidArguments(format!(
                "argument {index}: expected string, got {}",
                v.kind()
            ))
        })
    }

    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        self.get(index)
            .clone()
            .deserialize_into()
            .map_err(|e| BridgeError::InvalidArguments(format!("argument {index}: {e}")))
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// What a handler can reach while serving a call.
pub struct CallContext<'r, 'a> {
    capability: &'r str,
    remote: &'r mut Remote<'a>,
}

impl<'r, 'a> CallContext<'r, 'a> {
    pub(crate) fn new(capability: &'r str, remote: &'r mut Remote<'a>) -> Self {
        Self { capability, remote }
    }

    pub fn capability(&self) -> &str {
        self.capability
    }

    /// Fire an event on this capability's remote event target.
    pub fn emit(&mut self, event_type: &str, detail: Value) -> Result<RequestId> {
        self.remote.emit(self.capability, event_type, &detail)
    }

    pub fn remote(&mut self) -> &mut Remote<'a> {
        &mut *self.remote
    }
}

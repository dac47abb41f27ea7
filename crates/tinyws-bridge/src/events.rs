//! Event bus bookkeeping for capabilities that emit events.
//!
//! Listeners themselves live on the remote side, attached to the
//! capability's `EventTarget`. The host only records which
//! `(event type, listener id)` pairs were requested.
//!
//! Registrations are a list, not a set: adding the same pair twice keeps
//! two entries and each removal takes one away.

use std::collections::BTreeMap;

use tinyws_common::{BridgeError, ListenerId, Result};
use tracing::info;

use crate::capability::{Args, CallContext, Capability};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSource {
    listeners: BTreeMap<String, Vec<ListenerId>>,
}

impl EventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event_type: &str, listener: ListenerId) {
        info!(event = event_type, listener = %listener, "added listener");
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove one registration of `listener` for `event_type`. Removing a
    /// pair that was never added is a no-op and returns `false`.
    pub fn remove(&mut self, event_type: &str, listener: &ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(event_type) else {
            return false;
        };
        let Some(pos) = list.iter().position(|l| l == listener) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.listeners.remove(event_type);
        }
        info!(event = event_type, listener = %listener, "removed listener");
        true
    }

    pub fn listeners(&self, event_type: &str) -> &[ListenerId] {
        self.listeners
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.listeners.keys().map(String::as_str)
    }

    /// Total registrations across all event types.
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

fn source_of<'c, C: Capability>(capability: &'c mut C) -> Result<&'c mut EventSource> {
    let name = capability.name().to_string();
    capability
        .event_source()
        .ok_or_else(|| BridgeError::InvalidArguments(format!("{name} does not emit events")))
}

pub(crate) fn add_listener<C: Capability>(
    capability: &mut C,
    _cx: &mut CallContext<'_, '_>,
    args: Args,
) -> Result<Value> {
    let event_type = args.str(0)?.to_string();
    let listener = ListenerId::from(args.str(1)?);
    source_of(capability)?.add(&event_type, listener);
    Ok(Value::Absent)
}

pub(crate) fn remove_listener<C: Capability>(
    capability: &mut C,
    _cx: &mut CallContext<'_, '_>,
    args: Args,
) -> Result<Value> {
    let event_type = args.str(0)?.to_string();
    let listener = ListenerId::from(args.str(1)?);
    source_of(capability)?.remove(&event_type, &listener);
    Ok(Value::Absent)
}

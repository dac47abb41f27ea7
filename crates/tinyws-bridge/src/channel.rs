//! The primitive channel seam and the inbound queue.
//!
//! A script environment only has to offer two things:
//! - **Host -> remote**: evaluate a script and, some time later, report its
//!   outcome exactly once.
//! - **Remote -> host**: one-way messages posted on a named channel.
//!
//! Everything the environment reports back goes through a [`BridgeHandle`]
//! into a queue that the bridge drains on its own thread (`Bridge::pump`),
//! so environment callbacks never touch bridge tables directly.

use std::fmt;

use serde::{Deserialize, Serialize};
use tinyws_common::Result;
use tokio::sync::mpsc;
use tracing::debug;

/// Correlation id of one host-issued evaluation, unique per bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the bridge needs from a script environment.
pub trait PrimitiveChannel {
    /// Start evaluating `script` remotely. The environment must later report
    /// the outcome for `ticket` once, through
    /// [`BridgeHandle::deliver_result`] or [`BridgeHandle::deliver_failure`].
    fn evaluate(&mut self, ticket: RequestId, script: &str) -> Result<()>;

    /// Start forwarding messages the remote side posts on `name` to
    /// [`BridgeHandle::post_message`].
    fn bind_message_channel(&mut self, name: &str) -> Result<()>;
}

/// Items waiting to be processed on the bridge thread.
#[derive(Debug)]
pub(crate) enum BridgeEvent {
    /// Outcome of an evaluation. `Ok` carries the raw `[id, value]` JSON.
    Evaluated {
        ticket: RequestId,
        outcome: std::result::Result<String, String>,
    },
    /// A message posted by the remote side on a named channel.
    Message { channel: String, body: String },
    /// The remote document finished loading.
    PageLoaded,
    /// Host-initiated event push, usually from a worker thread.
    Emit {
        capability: String,
        event: String,
        detail: serde_json::Value,
    },
    /// Host-initiated fire-and-forget evaluation, usually from a worker.
    Evaluate { expression: String },
    /// A capability's proxy definition finished evaluating.
    ProxyReady {
        capability: String,
        generation: u64,
        outcome: std::result::Result<(), String>,
    },
}

/// Thread-safe entry point into a bridge.
///
/// Cloneable and `Send`; every method only enqueues. Returns `false` when
/// the bridge is gone.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

pub(crate) fn inbox() -> (BridgeHandle, mpsc::UnboundedReceiver<BridgeEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BridgeHandle { tx }, rx)
}

impl BridgeHandle {
    /// Report a successful evaluation. `raw` is the JSON text of the
    /// `[requestId, value]` envelope the script produced.
    pub fn deliver_result(&self, ticket: RequestId, raw: impl Into<String>) -> bool {
        self.send(BridgeEvent::Evaluated {
            ticket,
            outcome: Ok(raw.into()),
        })
    }

    /// Report that evaluating `ticket` raised remotely.
    pub fn deliver_failure(&self, ticket: RequestId, message: impl Into<String>) -> bool {
        self.send(BridgeEvent::Evaluated {
            ticket,
            outcome: Err(message.into()),
        })
    }

    /// Forward a message the remote side posted on `channel`.
    pub fn post_message(&self, channel: impl Into<String>, body: impl Into<String>) -> bool {
        self.send(BridgeEvent::Message {
            channel: channel.into(),
            body: body.into(),
        })
    }

    /// Signal that the remote document finished loading.
    pub fn page_loaded(&self) -> bool {
        self.send(BridgeEvent::PageLoaded)
    }

    /// Queue an event push for `capability`.
    pub fn emit(
        &self,
        capability: impl Into<String>,
        event: impl Into<String>,
        detail: serde_json::Value,
    ) -> bool {
        self.send(BridgeEvent::Emit {
            capability: capability.into(),
            event: event.into(),
            detail,
        })
    }

    /// Queue a fire-and-forget evaluation.
    pub fn evaluate(&self, expression: impl Into<String>) -> bool {
        self.send(BridgeEvent::Evaluate {
            expression: expression.into(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn send(&self, event: BridgeEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!(event = ?e.0, "bridge gone, dropping event");
                false
            }
        }
    }
}

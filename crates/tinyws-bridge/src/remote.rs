//! Outbound access to the remote side from inside the bridge thread.

use tinyws_common::Result;
use tracing::info;

use crate::channel::{BridgeHandle, PrimitiveChannel, RequestId};
use crate::correlator::{Correlator, PendingEvaluation};
use crate::proxy;
use crate::value::{RemoteFunction, Value};

/// Borrowed view of a bridge's correlator and channel, handed to capability
/// handlers and page-load hooks.
pub struct Remote<'a> {
    pub(crate) correlator: &'a mut Correlator,
    pub(crate) channel: &'a mut dyn PrimitiveChannel,
    pub(crate) handle: &'a BridgeHandle,
}

impl<'a> Remote<'a> {
    pub fn evaluate(&mut self, expression: &str) -> Result<PendingEvaluation> {
        self.correlator.issue_awaitable(self.channel, expression)
    }

    pub fn evaluate_detached(&mut self, expression: &str) -> Result<RequestId> {
        self.correlator.issue_detached(self.channel, expression)
    }

    pub fn evaluate_then(
        &mut self,
        expression: &str,
        on_complete: impl FnOnce(Result<Value>) + 'static,
    ) -> Result<RequestId> {
        self.correlator.issue(self.channel, expression, on_complete)
    }

    /// Invoke a function the remote side passed us. The awaitable yields
    /// the function's decoded return value.
    pub fn call_function(
        &mut self,
        function: &RemoteFunction,
        args: &[Value],
    ) -> Result<PendingEvaluation> {
        let script = proxy::invoke_script(function.handle(), args)?;
        self.evaluate(&script)
    }

    pub fn release_function(&mut self, function: &RemoteFunction) -> Result<RequestId> {
        let script = proxy::release_script(function.handle())?;
        self.evaluate_detached(&script)
    }

    /// Fire `event_type` on `capability`'s remote event target.
    pub fn emit(&mut self, capability: &str, event_type: &str, detail: &Value) -> Result<RequestId> {
        let script = proxy::emit_script(capability, event_type, detail)?;
        let id = self.evaluate_detached(&script)?;
        info!(capability, event = event_type, "emitted event");
        Ok(id)
    }

    /// A thread-safe handle for work that outlives this call.
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }
}

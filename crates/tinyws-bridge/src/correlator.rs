//! Request/response correlation for host-issued evaluations.
//!
//! Each evaluation is wrapped as `[id, (expression)]` so that the one-shot
//! result the environment hands back names the call it belongs to. The
//! correlator owns the table of outstanding calls for one bridge; ids are
//! never reused while it lives.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tinyws_common::{BridgeError, Result};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::channel::{PrimitiveChannel, RequestId};
use crate::value::Value;

type Callback = Box<dyn FnOnce(Result<Value>)>;

enum Completion {
    Callback(Callback),
    Awaitable(oneshot::Sender<Result<Value>>),
    Detached,
}

struct PendingCall {
    id: RequestId,
    expression: String,
    issued_at: Instant,
    deadline: Option<Instant>,
    completion: Completion,
}

impl PendingCall {
    /// Consumes the call, so it can only ever settle once.
    fn settle(self, outcome: Result<Value>) {
        match self.completion {
            Completion::Callback(cb) => cb(outcome),
            Completion::Awaitable(tx) => {
                if tx.send(outcome).is_err() {
                    debug!(request_id = %self.id, "awaitable dropped before result arrived");
                }
            }
            Completion::Detached => {
                if let Err(e) = outcome {
                    debug!(request_id = %self.id, error = %e, "detached evaluation did not complete");
                }
            }
        }
    }
}

/// A call the bridge was torn down with.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakedCall {
    pub id: RequestId,
    pub expression: String,
    pub age: Duration,
}

/// Awaitable result of an evaluation. Resolves exactly once.
#[derive(Debug)]
pub struct PendingEvaluation {
    id: RequestId,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingEvaluation {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Non-blocking check; `None` while the call is still outstanding.
    pub fn try_take(&mut self) -> Option<Result<Value>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(BridgeError::Cancelled)),
        }
    }
}

impl Future for PendingEvaluation {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(BridgeError::Cancelled)))
    }
}

/// Wrap an expression in its correlation envelope.
pub fn envelope(id: RequestId, expression: &str) -> String {
    format!("[{id}, ({expression})]")
}

/// Owns the pending-call table of one bridge.
pub struct Correlator {
    next_id: u64,
    pending: HashMap<RequestId, PendingCall>,
    default_timeout: Option<Duration>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
            default_timeout: None,
        }
    }

    /// Every call issued afterwards gets this deadline unless it asks for
    /// its own.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Issue `expression`; `on_complete` runs once when the result (or
    /// failure) is delivered, never synchronously from this call.
    pub fn issue(
        &mut self,
        channel: &mut dyn PrimitiveChannel,
        expression: &str,
        on_complete: impl FnOnce(Result<Value>) + 'static,
    ) -> Result<RequestId> {
        let deadline = self.default_deadline();
        self.submit(
            channel,
            expression,
            Completion::Callback(Box::new(on_complete)),
            deadline,
        )
    }

    pub fn issue_awaitable(
        &mut self,
        channel: &mut dyn PrimitiveChannel,
        expression: &str,
    ) -> Result<PendingEvaluation> {
        let deadline = self.default_deadline();
        self.submit_awaitable(channel, expression, deadline)
    }

    /// Like [`issue_awaitable`](Self::issue_awaitable) with an explicit
    /// deadline, enforced by [`evict_expired`](Self::evict_expired).
    pub fn issue_within(
        &mut self,
        channel: &mut dyn PrimitiveChannel,
        expression: &str,
        timeout: Duration,
    ) -> Result<PendingEvaluation> {
        self.submit_awaitable(channel, expression, Some(Instant::now() + timeout))
    }

    /// Issue without anyone waiting; failures are only logged.
    pub fn issue_detached(
        &mut self,
        channel: &mut dyn PrimitiveChannel,
        expression: &str,
    ) -> Result<RequestId> {
        let deadline = self.default_deadline();
        self.submit(channel, expression, Completion::Detached, deadline)
    }

    fn default_deadline(&self) -> Option<Instant> {
        self.default_timeout.map(|t| Instant::now() + t)
    }

    fn submit_awaitable(
        &mut self,
        channel: &mut dyn PrimitiveChannel,
        expression: &str,
        deadline: Option<Instant>,
    ) -> Result<PendingEvaluation> {
        let (tx, rx) = oneshot::channel();
        let id = self.submit(channel, expression, Completion::Awaitable(tx), deadline)?;
        Ok(PendingEvaluation { id, rx })
    }

    fn submit(
        &mut self,
        channel: &mut dyn PrimitiveChannel,
        expression: &str,
        completion: Completion,
        deadline: Option<Instant>,
    ) -> Result<RequestId> {
        if expression.trim().is_empty() {
            warn!("evaluate() called with no source code");
            return Err(BridgeError::EmptyExpression);
        }

        let id = RequestId(self.next_id);
        self.next_id += 1;

        self.pending.insert(
            id,
            PendingCall {
                id,
                expression: expression.to_string(),
                issued_at: Instant::now(),
                deadline,
                completion,
            },
        );

        if let Err(e) = channel.evaluate(id, &envelope(id, expression)) {
            // Never reached the remote side: nothing will ever answer it.
            self.pending.remove(&id);
            warn!(request_id = %id, error = %e, "failed to hand evaluation to channel");
            return Err(e);
        }

        debug!(request_id = %id, "evaluation issued");
        Ok(id)
    }

    /// Handle the raw `[id, value]` payload of a finished evaluation.
    ///
    /// Unknown, duplicate or malformed deliveries are logged and dropped.
    /// Returns the id that was settled, if any.
    pub fn on_result_delivered(&mut self, raw: &str) -> Option<RequestId> {
        let (id, value) = match parse_result(raw) {
            Some(parsed) => parsed,
            None => {
                warn!(payload_len = raw.len(), "malformed evaluation result, discarding");
                return None;
            }
        };

        match self.pending.remove(&id) {
            Some(call) => {
                debug!(request_id = %id, "evaluation resolved");
                call.settle(Ok(value));
                Some(id)
            }
            None => {
                warn!(request_id = %id, "evaluation id not pending, discarding result");
                None
            }
        }
    }

    /// Reject `id` because its expression raised remotely.
    pub fn on_evaluation_failed(&mut self, id: RequestId, message: &str) -> bool {
        match self.pending.remove(&id) {
            Some(call) => {
                warn!(
                    request_id = %id,
                    expression = %call.expression,
                    error = message,
                    "remote evaluation failed"
                );
                let err = BridgeError::Evaluation {
                    expression: call.expression.clone(),
                    message: message.to_string(),
                };
                call.settle(Err(err));
                true
            }
            None => {
                warn!(request_id = %id, error = message, "failure for unknown evaluation id, discarding");
                false
            }
        }
    }

    /// Abandon a call locally; a result that arrives later is dropped.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        match self.pending.remove(&id) {
            Some(call) => {
                debug!(request_id = %id, "evaluation cancelled");
                call.settle(Err(BridgeError::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Reject and evict every call whose deadline is at or before `now`.
    pub fn evict_expired(&mut self, now: Instant) -> Vec<RequestId> {
        let mut expired: Vec<RequestId> = self
            .pending
            .values()
            .filter(|c| c.deadline.is_some_and(|d| d <= now))
            .map(|c| c.id)
            .collect();
        expired.sort();

        for id in &expired {
            if let Some(call) = self.pending.remove(id) {
                let after_ms = now.saturating_duration_since(call.issued_at).as_millis() as u64;
                warn!(request_id = %id, expression = %call.expression, after_ms, "evaluation timed out");
                let err = BridgeError::Timeout {
                    expression: call.expression.clone(),
                    after_ms,
                };
                call.settle(Err(err));
            }
        }
        expired
    }

    /// Earliest deadline among outstanding calls.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().filter_map(|c| c.deadline).min()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Expression of an outstanding call.
    pub fn expression(&self, id: RequestId) -> Option<&str> {
        self.pending.get(&id).map(|c| c.expression.as_str())
    }

    /// Reject every outstanding call and report them.
    pub fn shutdown(&mut self) -> Vec<LeakedCall> {
        let mut calls: Vec<PendingCall> = self.pending.drain().map(|(_, c)| c).collect();
        calls.sort_by_key(|c| c.id);

        let now = Instant::now();
        calls
            .into_iter()
            .map(|call| {
                let leaked = LeakedCall {
                    id: call.id,
                    expression: call.expression.clone(),
                    age: now.saturating_duration_since(call.issued_at),
                };
                warn!(
                    request_id = %leaked.id,
                    expression = %leaked.expression,
                    age_ms = leaked.age.as_millis() as u64,
                    "evaluation still pending at shutdown"
                );
                call.settle(Err(BridgeError::Shutdown {
                    expression: leaked.expression.clone(),
                }));
                leaked
            })
            .collect()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.shutdown();
        }
    }
}

fn parse_result(raw: &str) -> Option<(RequestId, Value)> {
    let json: serde_json::Value = serde_json::from_str(raw).ok()?;
    let serde_json::Value::Array(mut items) = json else {
        return None;
    };
    if items.len() != 2 {
        return None;
    }
    let value = items.pop()?;
    let id = items.pop()?.as_u64()?;
    Some((RequestId(id), Value::from_json(value)))
}

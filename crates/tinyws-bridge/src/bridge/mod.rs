//! The bridge: one correlator, one capability registry, one channel.
//!
//! A bridge is driven from a single thread. The environment and worker
//! threads only ever enqueue through a [`BridgeHandle`]; [`Bridge::pump`]
//! drains that queue and is the only place bridge tables change.

use std::time::{Duration, Instant};

use tinyws_common::{BridgeError, Result};
use tinyws_config::BridgeConfig;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capability::{Capability, CapabilityRegistry, CapabilityState};
use crate::channel::{self, BridgeEvent, BridgeHandle, PrimitiveChannel, RequestId};
use crate::correlator::{Correlator, LeakedCall, PendingEvaluation};
use crate::proxy::{BOOTSTRAP_SCRIPT, READY_SCRIPT};
use crate::remote::Remote;
use crate::value::Value;


type LoadHookFn = Box<dyn FnMut(&mut Remote<'_>)>;

struct LoadHook {
    run: LoadHookFn,
    remaining: Option<u32>,
}

pub struct Bridge<C: PrimitiveChannel> {
    channel: C,
    correlator: Correlator,
    registry: CapabilityRegistry,
    load_hooks: Vec<LoadHook>,
    inbox: mpsc::UnboundedReceiver<BridgeEvent>,
    handle: BridgeHandle,
    config: BridgeConfig,
    loads: u64,
}

impl<C: PrimitiveChannel> Bridge<C> {
    /// Create a bridge; `connect` builds the channel around the handle the
    /// environment reports back through.
    pub fn new(config: &BridgeConfig, connect: impl FnOnce(BridgeHandle) -> C) -> Self {
        let (handle, inbox) = channel::inbox();
        let channel = connect(handle.clone());
        Self {
            channel,
            correlator: Correlator::new().with_default_timeout(config.evaluation_timeout()),
            registry: CapabilityRegistry::new(),
            load_hooks: Vec::new(),
            inbox,
            handle,
            config: config.clone(),
            loads: 0,
        }
    }

    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Number of page loads seen so far.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// Add a capability. It is exposed on the next page load, or right
    /// away if a page is already loaded.
    pub fn add_capability<Cap: Capability>(&mut self, capability: Cap) -> Result<()> {
        let name = capability.name().to_string();
        self.registry.add(capability)?;
        if self.loads > 0 {
            let mut remote = Remote {
                correlator: &mut self.correlator,
                channel: &mut self.channel,
                handle: &self.handle,
            };
            self.registry.register(&name, &mut remote)?;
        }
        Ok(())
    }

    pub fn capability_state(&self, name: &str) -> Option<CapabilityState> {
        self.registry.state(name)
    }

    pub fn capability_mut<Cap: Capability>(&mut self, name: &str) -> Option<&mut Cap> {
        self.registry.get_mut(name)
    }

    /// Run `hook` after each page load, at most `times` times if given.
    pub fn on_load(&mut self, hook: impl FnMut(&mut Remote<'_>) + 'static, times: Option<u32>) {
        self.load_hooks.push(LoadHook {
            run: Box::new(hook),
            remaining: times,
        });
    }

    pub fn evaluate(&mut self, expression: &str) -> Result<PendingEvaluation> {
        self.correlator.issue_awaitable(&mut self.channel, expression)
    }

    /// Evaluate with a deadline; the call is evicted by [`pump`](Self::pump)
    /// once it passes.
    pub fn evaluate_within(
        &mut self,
        expression: &str,
        timeout: Duration,
    ) -> Result<PendingEvaluation> {
        self.correlator
            .issue_within(&mut self.channel, expression, timeout)
    }

    pub fn evaluate_then(
        &mut self,
        expression: &str,
        on_complete: impl FnOnce(Result<Value>) + 'static,
    ) -> Result<RequestId> {
        self.correlator
            .issue(&mut self.channel, expression, on_complete)
    }

    /// Abandon an evaluation. A result arriving later is discarded.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        self.correlator.cancel(id)
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Fire `event_type` on a capability's remote event target.
    pub fn emit(&mut self, capability: &str, event_type: &str, detail: Value) -> Result<RequestId> {
        match self.registry.emits_events(capability) {
            None => return Err(BridgeError::UnknownCapability(capability.to_string())),
            Some(false) => {
                return Err(BridgeError::InvalidArguments(format!(
                    "{capability} does not emit events"
                )))
            }
            Some(true) => {}
        }
        let mut remote = Remote {
            correlator: &mut self.correlator,
            channel: &mut self.channel,
            handle: &self.handle,
        };
        remote.emit(capability, event_type, &detail)
    }

    /// Process everything queued so far, then evict expired evaluations.
    /// Returns the number of queued items handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = self.drain();

        let expired = self.correlator.evict_expired(Instant::now());
        if !expired.is_empty() {
            debug!(count = expired.len(), "evicted expired evaluations");
            // Eviction callbacks may have queued follow-up work.
            handled += self.drain();
        }
        handled
    }

    fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.inbox.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Earliest pending deadline; a host loop can sleep until then.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.correlator.next_deadline()
    }

    /// Tear the bridge down, rejecting and reporting every call still
    /// outstanding.
    pub fn shutdown(mut self) -> Vec<LeakedCall> {
        self.pump();
        let leaked = self.correlator.shutdown();
        if leaked.is_empty() {
            info!("bridge shut down cleanly");
        } else {
            warn!(count = leaked.len(), "bridge shut down with pending evaluations");
        }
        leaked
    }

    fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Evaluated {
                ticket,
                outcome: Ok(raw),
            } => {
                // The channel answers each ticket once; whatever the payload
                // says, the ticket must not stay pending.
                match self.correlator.on_result_delivered(&raw) {
                    Some(id) if id == ticket => {}
                    Some(id) => {
                        warn!(request_id = %id, ticket = %ticket, "result envelope id differs from ticket");
                        self.correlator
                            .on_evaluation_failed(ticket, "result envelope named another request");
                    }
                    None if self.correlator.is_pending(ticket) => {
                        self.correlator
                            .on_evaluation_failed(ticket, "malformed result envelope");
                    }
                    None => {}
                }
            }
            BridgeEvent::Evaluated {
                ticket,
                outcome: Err(message),
            } => {
                self.correlator.on_evaluation_failed(ticket, &message);
            }
            BridgeEvent::Message { channel, body } => {
                let mut remote = Remote {
                    correlator: &mut self.correlator,
                    channel: &mut self.channel,
                    handle: &self.handle,
                };
                self.registry.on_message(&channel, &body, &mut remote);
            }
            BridgeEvent::PageLoaded => self.page_loaded(),
            BridgeEvent::Emit {
                capability,
                event,
                detail,
            } => {
                if let Err(e) = self.emit(&capability, &event, Value::from_json(detail)) {
                    warn!(capability = %capability, event = %event, error = %e, "queued emit failed");
                }
            }
            BridgeEvent::Evaluate { expression } => {
                if let Err(e) = self.correlator.issue_detached(&mut self.channel, &expression) {
                    warn!(error = %e, "queued evaluation failed");
                }
            }
            BridgeEvent::ProxyReady {
                capability,
                generation,
                outcome,
            } => {
                let mut remote = Remote {
                    correlator: &mut self.correlator,
                    channel: &mut self.channel,
                    handle: &self.handle,
                };
                self.registry
                    .activate(&capability, generation, outcome, &mut remote);
            }
        }
    }

    fn page_loaded(&mut self) {
        self.loads += 1;
        debug!(load = self.loads, "page loaded");

        let mut remote = Remote {
            correlator: &mut self.correlator,
            channel: &mut self.channel,
            handle: &self.handle,
        };

        if let Err(e) = remote.evaluate_detached(BOOTSTRAP_SCRIPT) {
            warn!(error = %e, "failed to install bridge bootstrap");
            return;
        }
        if self.loads == 1 && self.config.announce_ready {
            if let Err(e) = remote.evaluate_detached(READY_SCRIPT) {
                warn!(error = %e, "failed to announce readiness");
            }
        }

        self.registry.register_all(&mut remote);

        for hook in &mut self.load_hooks {
            if hook.remaining == Some(0) {
                continue;
            }
            (hook.run)(&mut remote);
            if let Some(n) = hook.remaining.as_mut() {
                *n -= 1;
            }
        }
        self.load_hooks.retain(|h| h.remaining != Some(0));
    }
}

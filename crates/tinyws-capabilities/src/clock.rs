//! `clock`: pushes a `tick` event every `interval_ms` from a worker thread.
//!
//! The worker never touches the bridge directly. It only holds a
//! [`BridgeHandle`] and queues emits that the bridge thread sends on its
//! next pump.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::json;
use tinyws_bridge::{Args, BridgeHandle, CallContext, Capability, EventSource, Exports, Value};
use tinyws_common::{BridgeError, Result};
use tinyws_config::ClockConfig;
use tracing::{debug, info, warn};

pub const NAME: &str = "clock";
pub const TICK_EVENT: &str = "tick";

struct Worker {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

pub struct Clock {
    interval: Duration,
    events: EventSource,
    worker: Option<Worker>,
}

impl Clock {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            events: EventSource::new(),
            worker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished())
    }

    /// Start the worker. Returns `false` if it was already running.
    pub fn start(&mut self, handle: BridgeHandle) -> Result<bool> {
        if self.is_running() {
            return Ok(false);
        }
        // A worker that exited on its own (bridge gone) is reaped here.
        self.stop();

        let (stop, stop_rx) = mpsc::channel();
        let interval = self.interval;
        let thread = std::thread::Builder::new()
            .name("tinyws-clock".into())
            .spawn(move || tick_loop(handle, stop_rx, interval))
            .map_err(|e| BridgeError::Handler {
                method: "startTicking".into(),
                message: format!("failed to spawn clock worker: {e}"),
            })?;

        info!(interval_ms = interval.as_millis() as u64, "clock started");
        self.worker = Some(Worker { stop, thread });
        Ok(true)
    }

    /// Stop the worker and wait for it to exit. Returns `false` if it was
    /// not running.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        let was_running = !worker.thread.is_finished();
        drop(worker.stop);
        if worker.thread.join().is_err() {
            warn!("clock worker panicked");
        }
        if was_running {
            info!("clock stopped");
        }
        was_running
    }

    fn start_ticking(&mut self, cx: &mut CallContext<'_, '_>, _args: Args) -> Result<Value> {
        let handle = cx.remote().handle();
        self.start(handle).map(Value::Bool)
    }

    fn stop_ticking(&mut self, _cx: &mut CallContext<'_, '_>, _args: Args) -> Result<Value> {
        Ok(Value::Bool(self.stop()))
    }

    fn is_ticking(&mut self, _cx: &mut CallContext<'_, '_>, _args: Args) -> Result<Value> {
        Ok(Value::Bool(self.is_running()))
    }
}

fn tick_loop(handle: BridgeHandle, stop: mpsc::Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let timestamp = chrono::Utc::now().timestamp_millis();
                if !handle.emit(NAME, TICK_EVENT, json!({ "timestamp": timestamp })) {
                    debug!("bridge gone, clock worker exiting");
                    return;
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Capability for Clock {
    fn name(&self) -> &str {
        NAME
    }

    fn exports(&self) -> Exports<Self> {
        Exports::new()
            .method("startTicking", Clock::start_ticking)
            .method("stopTicking", Clock::stop_ticking)
            .method("isTicking", Clock::is_ticking)
            .with_events()
    }

    fn event_source(&mut self) -> Option<&mut EventSource> {
        Some(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;

    use super::*;
    use crate::testing::{loaded_bridge, response_for};

    fn fast_clock() -> Clock {
        Clock::new(&ClockConfig { interval_ms: 10 })
    }

    #[test]
    fn start_and_stop_report_transitions() {
        let mut bridge = loaded_bridge(fast_clock());
        let ch = bridge.channel();
        ch.call_with_token("clock", "startTicking", json!([]), "a");
        ch.call_with_token("clock", "startTicking", json!([]), "b");
        ch.call_with_token("clock", "isTicking", json!([]), "c");
        ch.call_with_token("clock", "stopTicking", json!([]), "d");
        ch.call_with_token("clock", "stopTicking", json!([]), "e");
        ch.call_with_token("clock", "isTicking", json!([]), "f");
        bridge.pump();

        let result = |token: &str| response_for(&bridge, token).unwrap();
        assert!(result("a").contains(r#"{"result":true}"#));
        assert!(result("b").contains(r#"{"result":false}"#));
        assert!(result("c").contains(r#"{"result":true}"#));
        assert!(result("d").contains(r#"{"result":true}"#));
        assert!(result("e").contains(r#"{"result":false}"#));
        assert!(result("f").contains(r#"{"result":false}"#));
    }

    #[test]
    fn ticks_arrive_through_pump() {
        let mut bridge = loaded_bridge(fast_clock());
        bridge.channel().call("clock", "startTicking", json!([]));
        bridge.pump();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            bridge.pump();
            let ticks = bridge
                .channel()
                .scripts_containing(r#"window.__tinyws.emit("clock", "tick", {"timestamp":"#)
                .count();
            if ticks >= 2 {
                break;
            }
            assert!(Instant::now() < deadline, "no ticks within 5s");
            std::thread::sleep(Duration::from_millis(5));
        }

        bridge
            .capability_mut::<Clock>("clock")
            .unwrap()
            .stop();
    }

    #[test]
    fn worker_exits_when_bridge_is_dropped() {
        let bridge = loaded_bridge(fast_clock());
        let handle = bridge.handle();
        drop(bridge);

        let mut clock = fast_clock();
        assert!(clock.start(handle).unwrap());
        let deadline = Instant::now() + Duration::from_secs(5);
        while clock.is_running() {
            assert!(Instant::now() < deadline, "worker kept running");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!clock.stop());
    }
}

//! `exampleEvent`: lets a page fire events at itself through the host.

use tinyws_bridge::{Args, CallContext, Capability, EventSource, Exports, Value};
use tinyws_common::Result;

pub const NAME: &str = "exampleEvent";

#[derive(Debug, Default)]
pub struct ExampleEvent {
    events: EventSource,
}

impl ExampleEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &EventSource {
        &self.events
    }

    fn trigger_custom_event(&mut self, cx: &mut CallContext<'_, '_>, args: Args) -> Result<Value> {
        let event_name = args.str(0)?;
        let detail = match args.get(1) {
            Value::Absent => Value::Map(Default::default()),
            other => other.clone(),
        };
        cx.emit(event_name, detail)?;
        Ok(Value::Absent)
    }
}

impl Capability for ExampleEvent {
    fn name(&self) -> &str {
        NAME
    }

    fn exports(&self) -> Exports<Self> {
        Exports::new()
            .method("triggerCustomEvent", ExampleEvent::trigger_custom_event)
            .with_events()
    }

    fn event_source(&mut self) -> Option<&mut EventSource> {
        Some(&mut self.events)
    }
}

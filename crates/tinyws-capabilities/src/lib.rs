//! Capabilities shipped with tinyws.
//!
//! - `hello`: timestamps and greetings, mostly for smoke tests.
//! - `systemInfo`: platform facts about the host.
//! - `exampleEvent`: re-emits whatever event the page asks for.
//! - `clock`: a background worker that pushes `tick` events.

pub mod clock;
pub mod example_event;
pub mod hello;
pub mod system_info;

pub use clock::Clock;
pub use example_event::ExampleEvent;
pub use hello::Hello;
pub use system_info::SystemInfo;

use tinyws_bridge::{Bridge, Capability, PrimitiveChannel};
use tinyws_common::Result;
use tinyws_config::CapabilitiesConfig;
use tracing::{info, warn};

/// Summary of one built-in capability, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityInfo {
    pub name: &'static str,
    pub methods: Vec<&'static str>,
    pub events: bool,
}

fn info_for<C: Capability>(mut capability: C, name: &'static str) -> CapabilityInfo {
    CapabilityInfo {
        name,
        methods: capability.exports().names().collect(),
        events: capability.event_source().is_some(),
    }
}

/// Every built-in capability, in registration order.
pub fn catalog(config: &CapabilitiesConfig) -> Vec<CapabilityInfo> {
    vec![
        info_for(Hello::new(), hello::NAME),
        info_for(SystemInfo::new(), system_info::NAME),
        info_for(ExampleEvent::new(), example_event::NAME),
        info_for(Clock::new(&config.clock), clock::NAME),
    ]
}

/// Add the capabilities enabled in `config` to `bridge`, in the order they
/// are listed. Returns how many were added.
pub fn install<C: PrimitiveChannel>(
    bridge: &mut Bridge<C>,
    config: &CapabilitiesConfig,
) -> Result<usize> {
    let mut added = 0;
    for name in &config.enabled {
        match name.as_str() {
            hello::NAME => bridge.add_capability(Hello::new())?,
            system_info::NAME => bridge.add_capability(SystemInfo::new())?,
            example_event::NAME => bridge.add_capability(ExampleEvent::new())?,
            clock::NAME => bridge.add_capability(Clock::new(&config.clock))?,
            other => {
                warn!(capability = other, "unknown built-in capability, skipping");
                continue;
            }
        }
        added += 1;
    }
    info!(count = added, "built-in capabilities installed");
    Ok(added)
}

#[cfg(test)]
pub(crate) mod testing {
    use tinyws_bridge::{Bridge, Capability, MemoryChannel};
    use tinyws_config::BridgeConfig;

    /// A bridge with `capability` added, a page loaded and every proxy
    /// acknowledged.
    pub fn loaded_bridge<C: Capability>(capability: C) -> Bridge<MemoryChannel> {
        let config = BridgeConfig {
            announce_ready: false,
            ..Default::default()
        };
        let mut bridge = Bridge::new(&config, MemoryChannel::new);
        bridge.add_capability(capability).unwrap();
        bridge.channel().load_page();
        bridge.pump();
        bridge.channel_mut().acknowledge_all();
        bridge.pump();
        bridge
    }

    /// The response script sent for `token`, if any.
    pub fn response_for(bridge: &Bridge<MemoryChannel>, token: &str) -> Option<String> {
        let needle = format!("\"{token}\", {{");
        bridge
            .channel()
            .scripts_containing(&needle)
            .last()
            .map(|s| s.script.clone())
    }
}

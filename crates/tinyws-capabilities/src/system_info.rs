//! `systemInfo`: static facts about the host platform.

use serde::Serialize;
use tinyws_bridge::{Args, CallContext, Capability, Exports, Value};
use tinyws_common::{BridgeError, Result};

pub const NAME: &str = "systemInfo";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlatformInfo {
    pub platform: &'static str,
    pub family: &'static str,
    pub architecture: &'static str,
    pub cpu_count: usize,
}

impl PlatformInfo {
    pub fn current() -> Self {
        Self {
            platform: std::env::consts::OS,
            family: std::env::consts::FAMILY,
            architecture: std::env::consts::ARCH,
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct SystemInfo;

impl SystemInfo {
    pub fn new() -> Self {
        Self
    }

    fn get_system_info(&mut self, _cx: &mut CallContext<'_, '_>, _args: Args) -> Result<Value> {
        Value::from_serializable(&PlatformInfo::current())
    }

    fn get_gpu_usage(&mut self, _cx: &mut CallContext<'_, '_>, _args: Args) -> Result<Value> {
        Err(BridgeError::Handler {
            method: "get_gpu_usage".into(),
            message: "GPU usage is not available on this host".into(),
        })
    }
}

impl Capability for SystemInfo {
    fn name(&self) -> &str {
        NAME
    }

    fn exports(&self) -> Exports<Self> {
        Exports::new()
            .method("get_system_info", SystemInfo::get_system_info)
            .method("get_gpu_usage", SystemInfo::get_gpu_usage)
    }
}

//! Bidirectional call bridge between a host process and a remote script
//! environment.
//!
//! The host evaluates expressions remotely and gets their results back
//! correlated by id ([`Correlator`]); the remote side calls named host
//! methods through generated proxies ([`Capability`]) and listens to host
//! events ([`EventSource`]). The environment itself is reached only through
//! a [`PrimitiveChannel`].

pub mod bridge;
pub mod capability;
pub mod channel;
pub mod correlator;
pub mod events;
pub mod memory;
pub mod proxy;
pub mod remote;
pub mod value;

pub use bridge::Bridge;
pub use capability::{
    Args, CallContext, Capability, CapabilityRegistry, CapabilityState, Exports, Handler,
    RemoteCallRequest,
};
pub use channel::{BridgeHandle, PrimitiveChannel, RequestId};
pub use correlator::{Correlator, LeakedCall, PendingEvaluation};
pub use events::EventSource;
pub use memory::{EvaluatedScript, MemoryChannel};
pub use proxy::{ProxyDescriptor, Response};
pub use remote::Remote;
pub use value::{RemoteFunction, Value, FUNCTION_TAG};

pub use tinyws_common::{BridgeError, Result};

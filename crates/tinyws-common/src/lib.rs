pub mod errors;
pub mod id;

pub use errors::{BridgeError, ConfigError, TinywsError};
pub use id::{new_callback_token, new_id, ListenerId};

pub type Result<T> = std::result::Result<T, BridgeError>;

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures produced while moving calls, results and events across the
/// script boundary.
///
/// Every variant is local to one operation: returning one of these never
/// leaves the bridge in an unusable state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// The codec cannot represent a value on the wire.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// A remote expression raised while being evaluated.
    #[error("evaluation of `{expression}` failed: {message}")]
    Evaluation { expression: String, message: String },

    /// An inbound call named a method the capability does not export.
    #[error("method not found: {capability}.{method}")]
    MethodNotFound { capability: String, method: String },

    /// An exported method failed while handling a call.
    #[error("{method} failed: {message}")]
    Handler { method: String, message: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("evaluate called with an empty expression")]
    EmptyExpression,

    #[error("evaluation of `{expression}` timed out after {after_ms}ms")]
    Timeout { expression: String, after_ms: u64 },

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("bridge shut down while `{expression}` was pending")]
    Shutdown { expression: String },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("capability not registered: {0}")]
    UnknownCapability(String),

    #[error("capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("method exported twice: {capability}.{method}")]
    DuplicateMethod { capability: String, method: String },

    /// The capability exists but its remote proxy is not live yet.
    #[error("capability not active: {0}")]
    Inactive(String),
}

impl BridgeError {
    /// Text sent back to the remote caller when a call is rejected.
    ///
    /// Handler failures carry only the handler's own message, matching what
    /// a script-side `catch` would expect to see.
    pub fn remote_message(&self) -> String {
        match self {
            BridgeError::Handler { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TinywsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

use std::fmt;

/// Errors produced by the agent core.
#[derive(Debug)]
pub enum UplinkError {
    /// Construction-time configuration violations, one entry per broken rule.
    InvalidConfig(Vec<String>),
    /// A payload exceeded the per-message byte limit. The message is dropped.
    OversizeMessage { size: u64, limit: u64 },
    /// The handler is not running.
    Shutdown,
    /// The upstream transport failed. Retried as transient.
    Transport(String),
    Internal(String), // for any custom internal errors
}

impl std::error::Error for UplinkError {}

impl fmt::Display for UplinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UplinkError::InvalidConfig(violations) => {
                write!(f, "invalid configuration: {}", violations.join("; "))
            }
            UplinkError::OversizeMessage { size, limit } => {
                write!(f, "message payload of {size} bytes exceeds the {limit} byte limit")
            }
            UplinkError::Shutdown => write!(f, "handler has been shut down"),
            UplinkError::Transport(msg) => write!(f, "transport error: {msg}"),
            UplinkError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

//! Message model shared by producers, the QoS dispatcher and the egress.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::error::UplinkError;

/// Dispatch priority class. Higher variants are served first.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buckets a raw 0-99 service class into the four dispatch priorities.
impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        match value {
            0..=24 => Priority::Low,
            25..=49 => Priority::Medium,
            50..=74 => Priority::High,
            _ => Priority::Critical,
        }
    }
}

impl FromStr for Priority {
    type Err = UplinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(UplinkError::Internal(format!("unknown priority: {other}"))),
        }
    }
}

/// The unit of work forwarded end to end.
///
/// The payload is opaque to the dispatcher; only its length participates in
/// queue accounting. `destination` is carried untouched for the egress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub destination: String,
    pub priority: Priority,
    pub payload: Bytes,
    pub timestamp: u64,
}

/// Utility to create a new `Message` with a fresh id and timestamp.
pub fn new_message(
    destination: impl Into<String>,
    priority: Priority,
    payload: impl Into<Bytes>,
) -> Message {
    Message {
        id: generate_id(),
        destination: destination.into(),
        priority,
        payload: payload.into(),
        timestamp: current_timestamp(),
    }
}

/// Returns the current system time as a UNIX timestamp in milliseconds.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time is before Unix epoch")
        .as_millis() as u64
}

/// Generates a random u64 ID using UUID v4 (lower 64 bits)
fn generate_id() -> u64 {
    use uuid::Uuid;
    let uuid = Uuid::new_v4();
    let bytes = uuid.as_u128().to_be_bytes();
    u64::from_be_bytes(bytes[8..16].try_into().unwrap())
}

/// Serialize the message as one line-delimited JSON frame.
pub fn encode_frame(msg: &Message) -> Result<Bytes, UplinkError> {
    let mut buf = serde_json::to_vec(msg).map_err(|e| UplinkError::Internal(e.to_string()))?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

/// Deserialize a message from one frame line.
pub fn decode_frame(line: &str) -> Result<Message, UplinkError> {
    serde_json::from_str(line.trim()).map_err(|e| UplinkError::Internal(e.to_string()))
}

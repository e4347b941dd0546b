//! Configuration module for uplinkmq.
//!
//! Loads a structured TOML file into strongly-typed structs (`Config`,
//! `AgentConfig`, `QosConfig`) using `serde` + `toml`.
//!
//! # Example `uplinkmq.toml`
//! ```toml
//! [agent]
//! listen_addr = "127.0.0.1:7337"
//! remote_addr = "127.0.0.1:9000"
//!
//! [qos]
//! max_queue_bytes   = 1_048_576
//! max_message_bytes = 262_144
//! prioritize_oldest = false
//! ```
//!
//! The loader only shapes the data; semantic validation of the `[qos]` table
//! happens when the handler is constructed.

use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Local producer ingress address.
    pub listen_addr: String,
    /// Upstream service the agent forwards to.
    pub remote_addr: String,
}

/// Dispatch queue tuning. `max_message_bytes` must fit into
/// `max_queue_bytes`, otherwise an accepted message could never be held.
#[derive(Debug, Deserialize, Clone)]
pub struct QosConfig {
    /// Total payload-byte budget of the queue.
    pub max_queue_bytes: u64,
    /// Largest accepted single payload.
    pub max_message_bytes: u64,
    /// Serve the oldest message of a priority class first instead of the
    /// newest.
    #[serde(default)]
    pub prioritize_oldest: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub agent: AgentConfig,
    pub qos: QosConfig,
}

/// Load configuration from a TOML file into `Config`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, anyhow::Error> {
    let raw: String = fs::read_to_string(&path)?;
    let cfg: Config = toml::from_str(&raw)?;
    Ok(cfg)
}

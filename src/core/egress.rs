//! The downstream seam of the dispatch pipeline.

use async_trait::async_trait;

use crate::core::error::UplinkError;
use crate::core::message::Message;

/// A single-writer sink for outbound messages.
///
/// The dispatcher invokes `handle_message` from at most one task at a time,
/// so implementations do not need to be safe for concurrent writers. Any
/// error is treated as transient: the dispatcher re-enqueues the message and
/// tries again later.
#[async_trait]
pub trait Egress: Send + Sync {
    async fn handle_message(&self, msg: &Message) -> Result<(), UplinkError>;
}

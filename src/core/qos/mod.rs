//! QoS dispatch pipeline.
//!
//! Producers hand messages to the [`Handler`]; a single dispatcher task owns
//! the bounded priority queue and forwards one message at a time to the
//! egress, retrying transient failures and shedding the least important
//! traffic when the byte budget is exceeded.
//!
//! Ordering guarantees are per priority class only: of two queued messages
//! with different priorities the more important one is served first, and
//! within a class the tie-breaker is newest-first (oldest-first when
//! `prioritize_oldest` is configured). Under sustained pressure from a high
//! class, low-priority messages are never served and eventually trimmed:
//! priority here is a ranking, not a share.

mod dispatcher;
mod handler;
mod priority_queue;

pub use handler::Handler;

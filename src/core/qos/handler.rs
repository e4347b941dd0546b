//! The externally visible façade of the dispatch pipeline.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::config::QosConfig;
use crate::core::egress::Egress;
use crate::core::error::UplinkError;
use crate::core::message::Message;
use crate::core::qos::{dispatcher, priority_queue::PriorityQueue};

/// Accepts messages from producers and hands them to the dispatcher task.
///
/// The lifecycle lock is held for the whole of `start`, `stop` and `enqueue`
/// including the ingress send, so an enqueue can never race a concurrent
/// stop. Holding it across the send is deliberate: ingress is the
/// backpressure path, and slowing producers while the dispatcher is busy is
/// the intended behaviour.
pub struct Handler {
    egress: Arc<dyn Egress>,
    config: QosConfig,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Present iff the dispatcher task exists.
struct Running {
    ingress: mpsc::Sender<Message>,
    done: oneshot::Sender<()>,
}

impl Handler {
    /// Validates the configuration and builds an idle handler. Every broken
    /// rule is reported, not just the first one found.
    pub fn new(egress: Arc<dyn Egress>, config: QosConfig) -> Result<Self, UplinkError> {
        let mut violations = Vec::new();
        if config.max_queue_bytes == 0 {
            violations.push("max_queue_bytes must be positive".to_string());
        }
        if config.max_message_bytes == 0 {
            violations.push("max_message_bytes must be positive".to_string());
        }
        if config.max_message_bytes > config.max_queue_bytes {
            violations.push(format!(
                "max_message_bytes ({}) must not exceed max_queue_bytes ({})",
                config.max_message_bytes, config.max_queue_bytes
            ));
        }
        if !violations.is_empty() {
            return Err(UplinkError::InvalidConfig(violations));
        }

        Ok(Self {
            egress,
            config,
            running: Mutex::new(None),
        })
    }

    /// Launches the dispatcher task. Idempotent: a second start while
    /// running is a no-op.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        // Capacity 1: producers feel backpressure as soon as the dispatcher
        // is busy with a previous message.
        let (ingress_tx, ingress_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let queue = PriorityQueue::new(&self.config);
        tokio::spawn(dispatcher::run(
            done_rx,
            ingress_rx,
            queue,
            Arc::clone(&self.egress),
        ));

        *running = Some(Running {
            ingress: ingress_tx,
            done: done_tx,
        });
        debug!("qos handler started");
    }

    /// Signals the dispatcher to exit and closes the ingress channel.
    /// Idempotent, and never waits for the task to observe the signal.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            return;
        };

        let _ = current.done.send(());
        // Dropping the sender closes ingress; the dispatcher exits on
        // whichever signal it sees first.
        drop(current.ingress);
        debug!("qos handler stopped");
    }

    /// Queues one message for delivery. Blocks while the dispatcher is busy;
    /// fails fast with [`UplinkError::Shutdown`] when the handler is not
    /// running.
    pub async fn enqueue(&self, msg: Message) -> Result<(), UplinkError> {
        let running = self.running.lock().await;
        match running.as_ref() {
            None => Err(UplinkError::Shutdown),
            Some(current) => current
                .ingress
                .send(msg)
                .await
                .map_err(|_| UplinkError::Shutdown),
        }
    }
}

//! Delivery loop: owns the priority queue and drives at most one in-flight
//! delivery at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::core::egress::Egress;
use crate::core::message::Message;
use crate::core::qos::priority_queue::PriorityQueue;

/// Handle on one launched delivery.
///
/// The delivery task sends the original message on `failed` iff the egress
/// reported an error, then drops the `ready` sender. Closure of `ready` is
/// the completion signal, so the loop can wait on it without knowing whether
/// a retry payload is pending.
struct InFlight {
    ready: oneshot::Receiver<()>,
    failed: oneshot::Receiver<Message>,
}

/// Runs until `done` fires or the ingress channel closes. Messages still
/// queued at that point are dropped; an in-flight delivery is not cancelled,
/// its result is discarded.
pub(super) async fn run(
    mut done: oneshot::Receiver<()>,
    mut ingress: mpsc::Receiver<Message>,
    mut queue: PriorityQueue,
    egress: Arc<dyn Egress>,
) {
    let mut in_flight: Option<InFlight> = None;

    loop {
        // biased: the stop signal must win over pending ingress.
        tokio::select! {
            biased;

            _ = &mut done => {
                debug!(
                    queued = queue.len(),
                    queued_bytes = queue.size_bytes(),
                    "dispatcher stopped"
                );
                return;
            }

            failed = await_delivery(&mut in_flight) => {
                in_flight = None;
                if let Some(msg) = failed {
                    warn!(id = msg.id, "delivery failed, re-enqueueing");
                    if let Err(err) = queue.enqueue(msg) {
                        debug!(%err, "retry dropped");
                    }
                }
                if let Some(next) = queue.dequeue() {
                    in_flight = Some(launch(&egress, next));
                }
            }

            received = ingress.recv() => {
                let Some(msg) = received else {
                    debug!(queued = queue.len(), "ingress closed, dispatcher exiting");
                    return;
                };
                if let Err(err) = queue.enqueue(msg) {
                    debug!(%err, "message dropped");
                }
                if in_flight.is_none() {
                    if let Some(next) = queue.dequeue() {
                        in_flight = Some(launch(&egress, next));
                    }
                }
            }
        }
    }
}

/// Resolves once the in-flight delivery finishes, yielding the message to
/// retry when it failed. Pends forever while no delivery is in flight.
async fn await_delivery(slot: &mut Option<InFlight>) -> Option<Message> {
    match slot.as_mut() {
        Some(flight) => {
            let _ = (&mut flight.ready).await;
            flight.failed.try_recv().ok()
        }
        None => std::future::pending().await,
    }
}

/// Hands one message to the egress on a subordinate task.
fn launch(egress: &Arc<dyn Egress>, msg: Message) -> InFlight {
    let (ready_tx, ready) = oneshot::channel();
    let (failed_tx, failed) = oneshot::channel();
    let egress = Arc::clone(egress);

    tokio::spawn(async move {
        if let Err(err) = egress.handle_message(&msg).await {
            debug!(id = msg.id, %err, "egress rejected message");
            let _ = failed_tx.send(msg);
        }
        drop(ready_tx);
    });

    InFlight { ready, failed }
}

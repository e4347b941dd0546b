#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use uplinkmq::core::egress::Egress;
use uplinkmq::core::error::UplinkError;
use uplinkmq::core::message::Message;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let guard = uplinkmq::logging::init_logging();
        std::mem::forget(guard);
    });
}

/// Scripted egress: records successful deliveries, can park deliveries
/// behind a pause gate, and can fail a number of attempts before succeeding.
pub struct TestEgress {
    delivered: Mutex<Vec<Message>>,
    attempts: AtomicUsize,
    fail_remaining: AtomicUsize,
    gate_tx: watch::Sender<bool>,
    gate_rx: watch::Receiver<bool>,
}

impl TestEgress {
    pub fn new() -> Arc<Self> {
        let (gate_tx, gate_rx) = watch::channel(false);
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_remaining: AtomicUsize::new(0),
            gate_tx,
            gate_rx,
        })
    }

    /// Park subsequent deliveries until `resume` is called.
    pub fn pause(&self) {
        let _ = self.gate_tx.send(true);
    }

    pub fn resume(&self) {
        let _ = self.gate_tx.send(false);
    }

    /// Fail the next `n` delivery attempts with a transport error.
    pub fn fail_times(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of times the dispatcher invoked this egress, including parked
    /// and failed attempts.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<Message> {
        self.delivered.lock().clone()
    }

    pub fn delivered_destinations(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|m| m.destination.clone())
            .collect()
    }
}

#[async_trait]
impl Egress for TestEgress {
    async fn handle_message(&self, msg: &Message) -> Result<(), UplinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate_rx.clone();
        loop {
            if !*gate.borrow_and_update() {
                break;
            }
            if gate.changed().await.is_err() {
                break;
            }
        }

        // Single in-flight delivery, so no load/sub race here.
        if self.fail_remaining.load(Ordering::SeqCst) > 0 {
            self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(UplinkError::Transport("scripted failure".to_string()));
        }

        self.delivered.lock().push(msg.clone());
        Ok(())
    }
}

/// Polls `cond` until it holds, panicking after five seconds.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    if waited.is_err() {
        panic!("timed out waiting for {what}");
    }
}

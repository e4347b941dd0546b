//! Bounded priority queue backing the dispatcher.
//!
//! A binary heap over a Vec with an explicit comparison, because the order is
//! stateful: serving pops the most important item, while `trim` flips the
//! priority clause so evictions hit the least important first. The std
//! `BinaryHeap` fixes the order in the element type and cannot express that.

use crate::config::QosConfig;
use crate::core::error::UplinkError;
use crate::core::message::Message;

/// A queued message plus its ingest stamp.
///
/// `seq` comes from the queue's push counter. A re-enqueued retry gets a
/// fresh value, so it competes as the youngest of its priority class.
#[derive(Debug)]
struct QueuedItem {
    msg: Message,
    seq: u64,
}

#[derive(Debug)]
pub(crate) struct PriorityQueue {
    items: Vec<QueuedItem>,
    next_seq: u64,
    /// Sum of payload lengths of all held items.
    size_bytes: u64,
    max_queue_bytes: u64,
    max_message_bytes: u64,
    /// Tie-breaker within a priority class: oldest first when set, newest
    /// first otherwise.
    prioritize_oldest: bool,
    /// Flipped only inside `trim` so pops return the least important item.
    prioritize_lowest: bool,
}

impl PriorityQueue {
    pub(crate) fn new(config: &QosConfig) -> Self {
        Self {
            items: Vec::new(),
            next_seq: 0,
            size_bytes: 0,
            max_queue_bytes: config.max_queue_bytes,
            max_message_bytes: config.max_message_bytes,
            prioritize_oldest: config.prioritize_oldest,
            prioritize_lowest: false,
        }
    }

    /// Queues the given message, then sheds the least important items until
    /// the byte budget holds again.
    pub(crate) fn enqueue(&mut self, msg: Message) -> Result<(), UplinkError> {
        let size = msg.payload.len() as u64;
        if size > self.max_message_bytes {
            return Err(UplinkError::OversizeMessage {
                size,
                limit: self.max_message_bytes,
            });
        }

        self.push(msg);
        self.trim();
        Ok(())
    }

    /// Removes and returns the most important message, or `None` when empty.
    pub(crate) fn dequeue(&mut self) -> Option<Message> {
        self.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Evicts items until `size_bytes` is within `max_queue_bytes`.
    ///
    /// The rebuilds are O(n) and only run under pressure: flip the comparison
    /// so pops return the least important item, pop until the budget holds,
    /// then restore serving order.
    fn trim(&mut self) {
        if self.size_bytes <= self.max_queue_bytes {
            return;
        }

        self.prioritize_lowest = true;
        self.rebuild();
        while self.size_bytes > self.max_queue_bytes {
            self.pop();
        }
        self.prioritize_lowest = false;
        self.rebuild();
    }

    fn push(&mut self, msg: Message) {
        self.next_seq += 1;
        self.size_bytes += msg.payload.len() as u64;
        self.items.push(QueuedItem {
            msg,
            seq: self.next_seq,
        });
        self.sift_up(self.items.len() - 1);
    }

    fn pop(&mut self) -> Option<Message> {
        if self.items.is_empty() {
            return None;
        }

        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let item = self.items.pop()?;
        self.size_bytes -= item.msg.payload.len() as u64;
        if !self.items.is_empty() {
            self.sift_down(0);
        }

        Some(item.msg)
    }

    /// Whether `a` is popped before `b` under the current mode.
    fn comes_before(&self, a: &QueuedItem, b: &QueuedItem) -> bool {
        if a.msg.priority != b.msg.priority {
            if self.prioritize_lowest {
                return a.msg.priority < b.msg.priority;
            }
            return a.msg.priority > b.msg.priority;
        }

        if self.prioritize_oldest {
            a.seq < b.seq
        } else {
            a.seq > b.seq
        }
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.comes_before(&self.items[idx], &self.items[parent]) {
                break;
            }
            self.items.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }

            let mut first = left;
            let right = left + 1;
            if right < len && self.comes_before(&self.items[right], &self.items[left]) {
                first = right;
            }
            if !self.comes_before(&self.items[first], &self.items[idx]) {
                break;
            }
            self.items.swap(idx, first);
            idx = first;
        }
    }

    /// Re-establishes the heap order in O(n) after the comparison changed.
    fn rebuild(&mut self) {
        for idx in (0..self.items.len() / 2).rev() {
            self.sift_down(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{new_message, Priority};

    fn cfg(max_queue_bytes: u64, max_message_bytes: u64, prioritize_oldest: bool) -> QosConfig {
        QosConfig {
            max_queue_bytes,
            max_message_bytes,
            prioritize_oldest,
        }
    }

    fn msg(destination: &str, priority: Priority, size: usize) -> Message {
        new_message(destination, priority, vec![0u8; size])
    }

    fn destinations(pq: &mut PriorityQueue) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(m) = pq.dequeue() {
            out.push(m.destination);
        }
        out
    }

    fn assert_invariants(pq: &PriorityQueue) {
        let total: u64 = pq.items.iter().map(|i| i.msg.payload.len() as u64).sum();
        assert_eq!(pq.size_bytes(), total, "size accounting drifted");
        assert!(pq.size_bytes() <= pq.max_queue_bytes, "byte budget violated");
        assert!(pq
            .items
            .iter()
            .all(|i| i.msg.payload.len() as u64 <= pq.max_message_bytes));
        assert!(!pq.prioritize_lowest, "trim mode leaked");
    }

    #[test]
    fn dequeue_on_empty_returns_none() {
        let mut pq = PriorityQueue::new(&cfg(1024, 1024, false));
        assert!(pq.dequeue().is_none());
        assert_eq!(pq.len(), 0);
        assert_eq!(pq.size_bytes(), 0);
    }

    #[test]
    fn oversize_payload_rejected() {
        let mut pq = PriorityQueue::new(&cfg(1024, 100, false));
        let err = pq.enqueue(msg("big", Priority::High, 101)).unwrap_err();
        assert!(matches!(
            err,
            UplinkError::OversizeMessage {
                size: 101,
                limit: 100
            }
        ));
        assert_eq!(pq.len(), 0);
        assert_invariants(&pq);
    }

    #[test]
    fn serves_highest_priority_first() {
        let mut pq = PriorityQueue::new(&cfg(1024, 1024, false));
        pq.enqueue(msg("medium", Priority::Medium, 10)).unwrap();
        pq.enqueue(msg("low", Priority::Low, 10)).unwrap();
        pq.enqueue(msg("critical", Priority::Critical, 10)).unwrap();
        pq.enqueue(msg("high", Priority::High, 10)).unwrap();
        assert_invariants(&pq);

        assert_eq!(destinations(&mut pq), ["critical", "high", "medium", "low"]);
    }

    #[test]
    fn later_arrival_overtakes_lower_priorities() {
        let mut pq = PriorityQueue::new(&cfg(1024, 1024, false));
        pq.enqueue(msg("low-1", Priority::Low, 10)).unwrap();
        pq.enqueue(msg("low-2", Priority::Low, 10)).unwrap();
        pq.enqueue(msg("high", Priority::High, 10)).unwrap();

        assert_eq!(pq.dequeue().unwrap().destination, "high");
    }

    #[test]
    fn equal_priority_serves_newest_first_by_default() {
        let mut pq = PriorityQueue::new(&cfg(1024, 1024, false));
        pq.enqueue(msg("a", Priority::Medium, 10)).unwrap();
        pq.enqueue(msg("b", Priority::Medium, 10)).unwrap();
        pq.enqueue(msg("c", Priority::Medium, 10)).unwrap();

        assert_eq!(destinations(&mut pq), ["c", "b", "a"]);
    }

    #[test]
    fn equal_priority_serves_oldest_first_when_configured() {
        let mut pq = PriorityQueue::new(&cfg(1024, 1024, true));
        pq.enqueue(msg("a", Priority::Medium, 10)).unwrap();
        pq.enqueue(msg("b", Priority::Medium, 10)).unwrap();
        pq.enqueue(msg("c", Priority::Medium, 10)).unwrap();

        assert_eq!(destinations(&mut pq), ["a", "b", "c"]);
    }

    #[test]
    fn size_accounting_tracks_payload_bytes() {
        let mut pq = PriorityQueue::new(&cfg(1024, 1024, false));
        pq.enqueue(msg("a", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("b", Priority::High, 200)).unwrap();
        assert_eq!(pq.size_bytes(), 300);
        assert_invariants(&pq);

        pq.dequeue().unwrap();
        assert_eq!(pq.size_bytes(), 100);
        pq.dequeue().unwrap();
        assert_eq!(pq.size_bytes(), 0);
    }

    #[test]
    fn trim_evicts_lowest_priority_class_first() {
        let mut pq = PriorityQueue::new(&cfg(300, 200, false));
        pq.enqueue(msg("low-1", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("medium", Priority::Medium, 100)).unwrap();
        pq.enqueue(msg("high", Priority::High, 100)).unwrap();
        assert_eq!(pq.size_bytes(), 300);

        // One more low message overflows the budget; the low class loses one.
        pq.enqueue(msg("low-2", Priority::Low, 100)).unwrap();
        assert_eq!(pq.size_bytes(), 300);
        assert_eq!(pq.len(), 3);
        assert_invariants(&pq);

        assert_eq!(destinations(&mut pq), ["high", "medium", "low-1"]);
    }

    #[test]
    fn trim_evicts_newest_within_class_by_default() {
        let mut pq = PriorityQueue::new(&cfg(250, 200, false));
        pq.enqueue(msg("low-1", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("low-2", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("low-3", Priority::Low, 100)).unwrap();
        assert_eq!(pq.size_bytes(), 200);
        assert_invariants(&pq);

        // The incoming message is the newest of its class and is shed first.
        assert_eq!(destinations(&mut pq), ["low-2", "low-1"]);
    }

    #[test]
    fn trim_evicts_oldest_within_class_when_prioritizing_oldest() {
        let mut pq = PriorityQueue::new(&cfg(250, 200, true));
        pq.enqueue(msg("low-1", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("low-2", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("low-3", Priority::Low, 100)).unwrap();
        assert_eq!(pq.size_bytes(), 200);
        assert_invariants(&pq);

        assert_eq!(destinations(&mut pq), ["low-2", "low-3"]);
    }

    #[test]
    fn trim_sheds_in_non_decreasing_priority_order() {
        let mut pq = PriorityQueue::new(&cfg(300, 200, false));
        pq.enqueue(msg("high", Priority::High, 100)).unwrap();
        pq.enqueue(msg("low", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("medium", Priority::Medium, 100)).unwrap();

        // 200 extra bytes force two evictions: low goes, then medium.
        pq.enqueue(msg("critical", Priority::Critical, 200)).unwrap();
        assert_eq!(pq.size_bytes(), 300);
        assert_invariants(&pq);

        assert_eq!(destinations(&mut pq), ["critical", "high"]);
    }

    #[test]
    fn payload_over_queue_budget_is_accepted_then_shed() {
        // Unvalidated limits on purpose: the per-message bound admits a
        // payload the queue budget cannot hold.
        let mut pq = PriorityQueue::new(&cfg(100, 200, false));
        pq.enqueue(msg("too-big", Priority::Critical, 150)).unwrap();
        assert_eq!(pq.len(), 0);
        assert_eq!(pq.size_bytes(), 0);
    }

    #[test]
    fn serving_order_restored_after_trim() {
        let mut pq = PriorityQueue::new(&cfg(300, 200, false));
        pq.enqueue(msg("low", Priority::Low, 100)).unwrap();
        pq.enqueue(msg("medium", Priority::Medium, 100)).unwrap();
        pq.enqueue(msg("high", Priority::High, 100)).unwrap();
        pq.enqueue(msg("low-2", Priority::Low, 100)).unwrap();
        assert_invariants(&pq);

        // After trimming, pops must serve the most important again.
        let first = pq.dequeue().unwrap();
        assert_eq!(first.priority, Priority::High);
    }

    #[test]
    fn heap_order_holds_across_mixed_operations() {
        let mut pq = PriorityQueue::new(&cfg(10_000, 1_000, false));
        for i in 0..8u8 {
            let priority = Priority::from((i * 13) % 100);
            pq.enqueue(msg(&format!("m{i}"), priority, 10 + i as usize))
                .unwrap();
        }
        pq.dequeue().unwrap();
        pq.enqueue(msg("extra", Priority::Medium, 50)).unwrap();
        assert_invariants(&pq);

        let mut last = Priority::Critical;
        while let Some(m) = pq.dequeue() {
            assert!(m.priority <= last, "priority order violated");
            last = m.priority;
        }
    }
}

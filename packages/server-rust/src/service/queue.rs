//! Priority message queue for asynchronous calls.
//!
//! Items are kept sorted by descending priority; equal priorities keep
//! their submission order. Draining pops the head one item at a time, so an
//! item enqueued while a drain is in flight may or may not be picked up by
//! that drain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use interop_core::{ClockSource, QueueItem, QueueStatus, SystemClock};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use super::dispatcher::Dispatch;

/// In-memory, unbounded priority queue of pending calls.
pub struct MessageQueue {
    items: Mutex<VecDeque<QueueItem>>,
    next_seq: AtomicU64,
    clock: Arc<dyn ClockSource>,
}

impl MessageQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(1),
            clock,
        }
    }

    /// Queues a call and returns its generated id.
    ///
    /// The item is placed after every pending item with the same or higher
    /// priority, which is what an append followed by a stable descending
    /// sort would produce.
    pub fn enqueue(&self, target: String, method: String, params: Value, priority: i64) -> String {
        let id = self.next_id();
        let item = QueueItem {
            id: id.clone(),
            target,
            method,
            params,
            priority,
            timestamp: self.clock.now(),
            status: QueueStatus::Queued,
            result: None,
            error: None,
            completed_at: None,
            failed_at: None,
        };

        let size = {
            let mut items = self.items.lock();
            let position = items.partition_point(|queued| queued.priority >= priority);
            items.insert(position, item);
            items.len()
        };

        debug!(message_id = %id, priority, queue_size = size, "message queued");
        report_size(size);
        id
    }

    /// Returns the pending items in drain order without removing them.
    #[must_use]
    pub fn peek_all(&self) -> Vec<QueueItem> {
        self.items.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Removes up to `limit` items from the head and dispatches each one.
    ///
    /// Every removed item is returned, in processing order, with a terminal
    /// status. A failed dispatch marks that item `failed` and draining moves
    /// on; nothing is re-enqueued.
    pub async fn drain<D>(&self, dispatcher: &D, limit: usize) -> Vec<QueueItem>
    where
        D: Dispatch + ?Sized,
    {
        let mut processed = Vec::with_capacity(limit.min(self.len()));

        for _ in 0..limit {
            // The lock is released before dispatching so enqueues never wait
            // on a module's network round trip.
            let next = self.items.lock().pop_front();
            let Some(mut item) = next else {
                break;
            };

            match dispatcher
                .dispatch(&item.target, &item.method, item.params.clone())
                .await
            {
                Ok(outcome) => item.complete(outcome.result, self.clock.now()),
                Err(err) => {
                    warn!(message_id = %item.id, module = %item.target, error = %err, "queued call failed");
                    item.fail(err.to_string(), self.clock.now());
                }
            }

            metrics::counter!("interop_queue_processed_total", "status" => item.status.as_str())
                .increment(1);
            processed.push(item);
        }

        report_size(self.len());
        processed
    }

    fn next_id(&self) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("msg_{seq}_{:08x}", rand::random::<u32>())
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_precision_loss)]
fn report_size(size: usize) {
    metrics::gauge!("interop_queue_size").set(size as f64);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

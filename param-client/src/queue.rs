//! Thread-safe bounded queues between the link and the engine.
//!
//! Wraps a [`BoundedBuffer`] in a mutex and pairs it with a [`Notify`] so the
//! engine can wait for inbound traffic with a timeout instead of spinning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mavparam_core::{BoundedBuffer, BufferError, OverflowPolicy};
use tokio::sync::Notify;

/// Bounded, shareable FIFO.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    buffer: Mutex<BoundedBuffer<T>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl<T> BoundedQueue<T> {
    /// Create a queue with an explicit overflow policy.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            buffer: Mutex::new(BoundedBuffer::new(capacity, policy)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Receive-side queue: the oldest message is evicted on overflow.
    pub fn inbound(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::DropOldest)
    }

    /// Transmit-side queue: new commands are rejected on overflow.
    pub fn outbound(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::Reject)
    }

    fn lock(&self) -> MutexGuard<'_, BoundedBuffer<T>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item without blocking.
    pub fn push(&self, item: T) -> Result<(), BufferError> {
        let evicted = self.lock().push(item)?;
        if evicted.is_some() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!("Queue full, evicted oldest entry ({} dropped so far)", total);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Remove the oldest item if there is one.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop()
    }

    /// Wait up to `timeout` for an item.
    pub async fn pop(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    /// Remove and return everything, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut buffer = self.lock();
        std::iter::from_fn(|| buffer.pop()).collect()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Entries evicted by the drop-oldest policy since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

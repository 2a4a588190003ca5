//! Fixed-capacity FIFO buffer for mavparam.
//!
//! This module provides the storage behind both link queues:
//! - FIFO ordering for delivery
//! - A hard capacity so pending messages never grow without bound
//! - A per-buffer overflow policy
//!
//! The outbound buffer rejects new commands when full, so a caller-issued
//! command is never silently displaced. The inbound buffer drops its oldest
//! entry instead, keeping the freshest view of the link.

use std::collections::VecDeque;
use thiserror::Error;

/// Error type for buffer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Buffer is at capacity and rejects new items.
    #[error("buffer full (capacity: {capacity})")]
    Full {
        /// Current buffer capacity.
        capacity: usize,
    },
}

/// What happens when pushing into a full buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Refuse the new item, keep existing items untouched.
    Reject,
    /// Evict the oldest item to make room for the new one.
    DropOldest,
}

/// Bounded FIFO with an overflow policy.
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    capacity: usize,
    policy: OverflowPolicy,
    items: VecDeque<T>,
}

impl<T> BoundedBuffer<T> {
    /// Create a new buffer with the given capacity and overflow policy.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            capacity,
            policy,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an item.
    ///
    /// Returns `Ok(Some(evicted))` when the drop-oldest policy displaced an
    /// entry (the new item itself when the capacity is zero), and
    /// `Err(BufferError::Full)` when the reject policy refused it.
    pub fn push(&mut self, item: T) -> Result<Option<T>, BufferError> {
        if self.items.len() < self.capacity {
            self.items.push_back(item);
            return Ok(None);
        }
        match self.policy {
            OverflowPolicy::Reject => Err(BufferError::Full {
                capacity: self.capacity,
            }),
            OverflowPolicy::DropOldest => match self.items.pop_front() {
                Some(evicted) => {
                    self.items.push_back(item);
                    Ok(Some(evicted))
                }
                None => Ok(Some(item)),
            },
        }
    }

    /// Remove and return the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if the buffer is at capacity.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Maximum number of items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy of this buffer.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Iterate items from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Remove all items.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

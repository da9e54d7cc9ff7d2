// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A single named FIFO queue.
//!
//! All operations take the queue's lock for the duration of one `VecDeque`
//! operation, so enqueue, dequeue and length are O(1) amortized and
//! linearizable. Removing the head never copies or rescans the remaining
//! messages.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;

use crate::metrics::{QUEUE_DEPTH, QUEUE_DEQUEUED, QUEUE_ENQUEUED};

/// Point-in-time counters of one queue.
///
/// `length == enqueued - dequeued` always holds for a snapshot, since all
/// three are read under the same lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub name:     String,
    pub length:   usize,
    pub enqueued: u64,
    pub dequeued: u64,
}

#[derive(Debug, Default)]
struct Inner {
    items:    VecDeque<Bytes>,
    enqueued: u64,
    dequeued: u64,
}

/// An ordered, in-memory queue of byte messages.
#[derive(Debug)]
pub struct Queue {
    name:  String,
    inner: Mutex<Inner>,
}

impl Queue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:  name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Appends a copy of `payload` to the tail.
    ///
    /// The payload is copied before the lock is taken, so the caller's buffer
    /// can be reused as soon as this returns.
    pub fn enqueue(&self, payload: impl AsRef<[u8]>) {
        let message = Bytes::copy_from_slice(payload.as_ref());
        let depth = {
            let mut inner = self.inner.lock();
            inner.items.push_back(message);
            inner.enqueued += 1;
            inner.items.len()
        };
        QUEUE_ENQUEUED.with_label_values(&[self.name.as_str()]).inc();
        QUEUE_DEPTH
            .with_label_values(&[self.name.as_str()])
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Removes and returns the head, or `None` when the queue is empty.
    /// Never blocks waiting for a message.
    pub fn dequeue(&self) -> Option<Bytes> {
        let (message, depth) = {
            let mut inner = self.inner.lock();
            let message = inner.items.pop_front()?;
            inner.dequeued += 1;
            (message, inner.items.len())
        };
        QUEUE_DEQUEUED.with_label_values(&[self.name.as_str()]).inc();
        QUEUE_DEPTH
            .with_label_values(&[self.name.as_str()])
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
        Some(message)
    }

    pub fn len(&self) -> usize { self.inner.lock().items.len() }

    pub fn is_empty(&self) -> bool { self.inner.lock().items.is_empty() }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            name:     self.name.clone(),
            length:   inner.items.len(),
            enqueued: inner.enqueued,
            dequeued: inner.dequeued,
        }
    }
}

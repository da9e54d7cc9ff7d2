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

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    metrics::QUEUES_CREATED,
    queue::{Queue, QueueStats},
};

/// Name → queue map.
///
/// Queues are created lazily on first reference and are never removed. The
/// registry lock only covers the map itself; message operations run under the
/// lock of the individual queue, so unrelated queues never contend.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self { Self::default() }

    /// Returns the queue called `name`, creating it if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<Queue> {
        if let Some(queue) = self.queues.read().get(name) {
            return Arc::clone(queue);
        }

        let mut queues = self.queues.write();
        Arc::clone(queues.entry(name.to_string()).or_insert_with(|| {
            debug!(queue = name, "creating queue");
            QUEUES_CREATED.inc();
            Arc::new(Queue::new(name))
        }))
    }

    /// Returns the queue called `name` without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Queue>> { self.queues.read().get(name).cloned() }

    pub fn enqueue(&self, name: &str, payload: impl AsRef<[u8]>) {
        self.get_or_create(name).enqueue(payload);
    }

    pub fn dequeue(&self, name: &str) -> Option<Bytes> { self.get_or_create(name).dequeue() }

    pub fn len(&self, name: &str) -> usize { self.get_or_create(name).len() }

    /// Names of every queue referenced so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Snapshot of every queue, sorted by name.
    pub fn stats(&self) -> Vec<QueueStats> {
        let queues: Vec<Arc<Queue>> = self.queues.read().values().cloned().collect();
        let mut stats: Vec<QueueStats> = queues.iter().map(|q| q.stats()).collect();
        stats.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

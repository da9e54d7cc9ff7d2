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

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lineq_common_storage_queue::QueueRegistry;

use crate::{QueueTransport, Result};

/// Transport backed by a registry living in the same process.
///
/// Never fails; useful for embedding the pipeline next to the queue and for
/// tests.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    registry: Arc<QueueRegistry>,
}

impl LocalTransport {
    pub const fn new(registry: Arc<QueueRegistry>) -> Self { Self { registry } }

    pub fn registry(&self) -> &Arc<QueueRegistry> { &self.registry }
}

#[async_trait]
impl QueueTransport for LocalTransport {
    async fn enqueue(&self, queue: &str, payload: Bytes) -> Result<()> {
        self.registry.enqueue(queue, payload);
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Bytes>> {
        Ok(self.registry.dequeue(queue))
    }

    async fn length(&self, queue: &str) -> Result<usize> { Ok(self.registry.len(queue)) }
}

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

//! Client side of the lineq queue service.
//!
//! [`QueueClient`] is bound to one queue name and exposes the three
//! operations the sync pipeline needs: `enqueue`, `dequeue` and `length`.
//! The bytes travel through a [`QueueTransport`]:
//!
//! - [`HttpTransport`] talks to a remote queue service,
//! - [`LocalTransport`] calls straight into an in-process
//!   [`QueueRegistry`](lineq_common_storage_queue::QueueRegistry).

pub mod config;
pub mod error;
pub mod http;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use http::HttpTransport;
use lineq_common_storage_queue::QueueRegistry;
pub use local::LocalTransport;
pub use reqwest::StatusCode;

/// Raw queue operations addressed by queue name.
#[async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Appends `payload` to the tail of `queue`.
    async fn enqueue(&self, queue: &str, payload: Bytes) -> Result<()>;

    /// Removes the head of `queue`. `Ok(None)` means the queue was empty.
    async fn dequeue(&self, queue: &str) -> Result<Option<Bytes>>;

    /// Current number of messages in `queue`.
    async fn length(&self, queue: &str) -> Result<usize>;
}

/// A handle on one named queue.
///
/// Cheap to clone; clones share the underlying transport (and its connection
/// pool).
#[derive(Clone)]
pub struct QueueClient {
    transport: Arc<dyn QueueTransport>,
    queue:     String,
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl QueueClient {
    pub fn new(transport: Arc<dyn QueueTransport>, queue: impl Into<String>) -> Self {
        Self {
            transport,
            queue: queue.into(),
        }
    }

    /// Client for `queue` on the remote service described by `config`.
    pub fn http(config: &ClientConfig, queue: impl Into<String>) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?), queue))
    }

    /// Client for `queue` inside `registry`, no network involved.
    pub fn local(registry: Arc<QueueRegistry>, queue: impl Into<String>) -> Self {
        Self::new(Arc::new(LocalTransport::new(registry)), queue)
    }

    pub fn queue(&self) -> &str { &self.queue }

    /// Same transport, different queue.
    #[must_use]
    pub fn with_queue(&self, queue: impl Into<String>) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            queue:     queue.into(),
        }
    }

    pub async fn enqueue(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.transport.enqueue(&self.queue, payload.into()).await
    }

    pub async fn dequeue(&self) -> Result<Option<Bytes>> { self.transport.dequeue(&self.queue).await }

    pub async fn length(&self) -> Result<usize> { self.transport.length(&self.queue).await }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_queue_shares_transport() {
        let registry = Arc::new(QueueRegistry::new());
        let lines = QueueClient::local(Arc::clone(&registry), "lines");
        let other = lines.with_queue("other");

        lines.enqueue("a\n").await.unwrap();
        other.enqueue("b\n").await.unwrap();

        assert_eq!(lines.queue(), "lines");
        assert_eq!(other.queue(), "other");
        assert_eq!(lines.length().await.unwrap(), 1);
        assert_eq!(other.length().await.unwrap(), 1);
        assert_eq!(registry.dequeue("other").unwrap(), "b\n");
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let registry = Arc::new(QueueRegistry::new());
        let client = QueueClient::local(registry, "round-trip");

        assert!(client.dequeue().await.unwrap().is_none());
        client.enqueue(Bytes::from_static(b"line1\n")).await.unwrap();
        client.enqueue(Bytes::from_static(b"line2\n")).await.unwrap();

        assert_eq!(client.dequeue().await.unwrap().unwrap(), "line1\n");
        assert_eq!(client.length().await.unwrap(), 1);
        assert_eq!(client.dequeue().await.unwrap().unwrap(), "line2\n");
        assert_eq!(client.length().await.unwrap(), 0);
    }
}

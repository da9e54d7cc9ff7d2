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

//! Consumer side of a producer/drain pairing.
//!
//! The consumer cannot see the producer; it only sees the queue. It stops
//! once two things hold at the same time:
//!
//! 1. the producer has signalled [`ProducerDone`] (latched the first time it
//!    is seen), and
//! 2. the queue reports a length of zero after that.
//!
//! An empty dequeue alone proves nothing: the producer may simply be slow.
//! A zero length alone proves nothing either: more lines may still come.

use bytes::Bytes;
use lineq_client::QueueClient;
use serde::Serialize;
use snafu::{OptionExt, ResultExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::DrainConfig,
    error::{CancelledSnafu, Result, TransportSnafu, WriteSinkSnafu},
    signal::{ProducerDone, sleep_or_cancel},
};

/// What one completed drain wrote to its sink.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub messages: u64,
    pub bytes:    u64,
}

/// Moves messages from `client`'s queue into `sink` until the producer is
/// done and the queue is empty, then flushes `sink`.
///
/// Transport and sink errors end the drain immediately, leaving whatever is
/// still queued in place.
pub async fn run_drain_coordinator<W>(
    client: &QueueClient,
    sink: &mut W,
    producer_done: &ProducerDone,
    config: &DrainConfig,
    cancel: &CancellationToken,
) -> Result<DrainReport>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut report = DrainReport::default();
    let mut done_seen = false;

    loop {
        if cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }

        if let Some(message) = dequeue(client, cancel).await? {
            sink.write_all(&message).await.context(WriteSinkSnafu)?;
            report.messages += 1;
            report.bytes += message.len() as u64;
            continue;
        }

        if !done_seen && producer_done.is_signalled() {
            debug!(queue = client.queue(), "producer finished, waiting for empty queue");
            done_seen = true;
        }

        if done_seen && length(client, cancel).await? == 0 {
            sink.flush().await.context(WriteSinkSnafu)?;
            info!(
                queue = client.queue(),
                messages = report.messages,
                bytes = report.bytes,
                "queue drained"
            );
            return Ok(report);
        }

        if !sleep_or_cancel(config.idle_interval, cancel).await {
            return CancelledSnafu.fail();
        }
    }
}

/// Dequeues and drops the messages already in `client`'s queue, returning
/// how many were dropped.
///
/// Bounded by the length read up front, so messages enqueued while this runs
/// are left alone.
pub async fn discard_backlog(client: &QueueClient, cancel: &CancellationToken) -> Result<u64> {
    let backlog = length(client, cancel).await?;
    let mut discarded = 0;
    for _ in 0..backlog {
        if dequeue(client, cancel).await?.is_none() {
            break;
        }
        discarded += 1;
    }
    if discarded > 0 {
        warn!(queue = client.queue(), discarded, "discarded stale messages");
    }
    Ok(discarded)
}

async fn dequeue(client: &QueueClient, cancel: &CancellationToken) -> Result<Option<Bytes>> {
    cancel
        .run_until_cancelled(client.dequeue())
        .await
        .context(CancelledSnafu)?
        .context(TransportSnafu {
            queue: client.queue(),
        })
}

async fn length(client: &QueueClient, cancel: &CancellationToken) -> Result<usize> {
    cancel
        .run_until_cancelled(client.length())
        .await
        .context(CancelledSnafu)?
        .context(TransportSnafu {
            queue: client.queue(),
        })
}

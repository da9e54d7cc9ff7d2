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

//! HTTP transport for the queue service.
//!
//! Wire format, per queue `name`:
//!
//! | Operation | Request                   | Success                                |
//! |-----------|---------------------------|----------------------------------------|
//! | enqueue   | `POST /queues/{name}`     | `202 Accepted`                         |
//! | dequeue   | `DELETE /queues/{name}`   | `200` with body, `204` when empty      |
//! | length    | `HEAD /queues/{name}`     | `200` with `X-Queue-Len: <n>` header   |
//!
//! Any other status is reported as [`ClientError::UnexpectedStatus`] with the
//! response body attached. The queue name is one percent-encoded path
//! segment, so names containing `/` or spaces address a single queue.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Response, StatusCode, Url,
    header::{CONTENT_TYPE, HeaderValue},
};
use snafu::{OptionExt, ResultExt};
use tracing::trace;

use crate::{
    QueueTransport,
    config::ClientConfig,
    error::{
        BuildClientSnafu, InvalidLengthHeaderSnafu, InvalidQueueUrlSnafu, MissingLengthHeaderSnafu,
        RequestSnafu, Result, UnexpectedStatusSnafu, UnsupportedQueueUrlSnafu,
    },
};

/// Header carrying the queue length in `HEAD` responses.
pub const QUEUE_LENGTH_HEADER: &str = "x-queue-len";

const OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");

/// Talks to a remote queue service with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http:     reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url: Url = config.queue_url.parse().context(InvalidQueueUrlSnafu {
            url: config.queue_url.as_str(),
        })?;
        snafu::ensure!(
            !base_url.cannot_be_a_base(),
            UnsupportedQueueUrlSnafu {
                url: config.queue_url.as_str(),
            }
        );
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context(BuildClientSnafu)?;
        Ok(Self { base_url, http })
    }

    pub const fn base_url(&self) -> &Url { &self.base_url }

    /// `{base}/queues/{queue}`, with `queue` encoded as one segment.
    fn queue_url(&self, queue: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can carry path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["queues", queue]);
        }
        url
    }
}

/// Turns a non-success response into [`ClientError::UnexpectedStatus`].
async fn unexpected(op: &'static str, queue: &str, response: Response) -> crate::ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    UnexpectedStatusSnafu {
        op,
        queue: queue.to_string(),
        status,
        body,
    }
    .build()
}

#[async_trait]
impl QueueTransport for HttpTransport {
    async fn enqueue(&self, queue: &str, payload: Bytes) -> Result<()> {
        trace!(queue, bytes = payload.len(), "enqueue");
        let response = self
            .http
            .post(self.queue_url(queue))
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(payload)
            .send()
            .await
            .context(RequestSnafu {
                op:    "enqueue",
                queue: queue.to_string(),
            })?;

        if response.status() == StatusCode::ACCEPTED {
            Ok(())
        } else {
            Err(unexpected("enqueue", queue, response).await)
        }
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Bytes>> {
        let response = self
            .http
            .delete(self.queue_url(queue))
            .send()
            .await
            .context(RequestSnafu {
                op:    "dequeue",
                queue: queue.to_string(),
            })?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.context(RequestSnafu {
                    op:    "dequeue",
                    queue: queue.to_string(),
                })?;
                trace!(queue, bytes = body.len(), "dequeue");
                Ok(Some(body))
            }
            StatusCode::NO_CONTENT => Ok(None),
            _ => Err(unexpected("dequeue", queue, response).await),
        }
    }

    async fn length(&self, queue: &str) -> Result<usize> {
        let response = self
            .http
            .head(self.queue_url(queue))
            .send()
            .await
            .context(RequestSnafu {
                op:    "length",
                queue: queue.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(unexpected("length", queue, response).await);
        }

        let value = response
            .headers()
            .get(QUEUE_LENGTH_HEADER)
            .context(MissingLengthHeaderSnafu {
                header: QUEUE_LENGTH_HEADER,
                queue:  queue.to_string(),
            })?;
        let invalid = || InvalidLengthHeaderSnafu {
            header: QUEUE_LENGTH_HEADER,
            queue:  queue.to_string(),
            value:  String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        value
            .to_str()
            .ok()
            .and_then(|text| text.trim().parse::<usize>().ok())
            .with_context(invalid)
    }
}

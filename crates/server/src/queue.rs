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

//! Queue endpoints over a shared [`QueueRegistry`].
//!
//! | Method   | Path                            | Result                                  |
//! |----------|---------------------------------|-----------------------------------------|
//! | `POST`   | `/queues/{name}`                | `202`; empty body is `400`              |
//! | `DELETE` | `/queues/{name}`                | `200` with the message, `204` if empty  |
//! | `HEAD`   | `/queues/{name}`                | `200` with `X-Queue-Len`                |
//! | `POST`   | `/queues/{name}/messages`       | raw bytes or JSON `{"message": "..."}`  |
//! | `DELETE` | `/queues/{name}/messages/head`  | same as `DELETE /queues/{name}`         |
//! | `GET`    | `/queues`                       | JSON list of queue stats                |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use bytes::Bytes;
use lineq_common_storage_queue::{QueueRegistry, QueueStats};
use serde::Deserialize;
use snafu::{ResultExt, ensure};
use tracing::trace;

use crate::error::{ApiResult, EmptyMessageSnafu, MalformedMessageSnafu};

/// Response header carrying the queue length.
pub const QUEUE_LENGTH_HEADER: &str = "x-queue-len";

const OCTET_STREAM: &str = "application/octet-stream";

/// Route handler mounting the queue API on `registry`.
pub fn queue_routes(registry: Arc<QueueRegistry>) -> impl Fn(Router) -> Router + Send + Sync + 'static {
    move |router: Router| {
        let api = Router::new()
            .route("/queues", get(list_queues))
            .route(
                "/queues/{name}",
                post(enqueue_raw).delete(dequeue).head(queue_length),
            )
            .route("/queues/{name}/messages", post(enqueue_message))
            .route("/queues/{name}/messages/head", delete(dequeue))
            .with_state(Arc::clone(&registry));
        router.merge(api)
    }
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

fn enqueue_checked(registry: &QueueRegistry, queue: String, payload: Bytes) -> ApiResult<StatusCode> {
    ensure!(!payload.is_empty(), EmptyMessageSnafu { queue });
    trace!(queue = %queue, bytes = payload.len(), "enqueue");
    registry.enqueue(&queue, payload);
    Ok(StatusCode::ACCEPTED)
}

async fn enqueue_raw(
    State(registry): State<Arc<QueueRegistry>>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    enqueue_checked(&registry, name, body)
}

async fn enqueue_message(
    State(registry): State<Arc<QueueRegistry>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if !is_json {
        return enqueue_checked(&registry, name, body);
    }

    let parsed: MessageBody = serde_json::from_slice(&body).context(MalformedMessageSnafu {
        queue: name.as_str(),
    })?;
    enqueue_checked(&registry, name, Bytes::from(parsed.message))
}

async fn dequeue(
    State(registry): State<Arc<QueueRegistry>>,
    Path(name): Path<String>,
) -> Response {
    match registry.dequeue(&name) {
        Some(message) => ([(CONTENT_TYPE, OCTET_STREAM)], message).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn queue_length(
    State(registry): State<Arc<QueueRegistry>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let length = registry.len(&name);
    (StatusCode::OK, [(QUEUE_LENGTH_HEADER, length.to_string())])
}

async fn list_queues(State(registry): State<Arc<QueueRegistry>>) -> Json<Vec<QueueStats>> {
    Json(registry.stats())
}

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

use std::any::Any;

use axum::{Json, response::IntoResponse};
use lineq_error::{ErrorExt, StackError, StatusCode};
use serde::Serialize;
use snafu::Snafu;
use strum::EnumProperty;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code:    StatusCode,
    pub message: String,
}

#[derive(Debug, Snafu, strum_macros::EnumProperty)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("Message for queue '{queue}' is empty"))]
    #[strum(props(status_code = "invalid_argument"))]
    EmptyMessage { queue: String },

    #[snafu(display("Malformed JSON message for queue '{queue}'"))]
    #[strum(props(status_code = "invalid_argument"))]
    MalformedMessage {
        queue:  String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to encode metrics"))]
    #[strum(props(status_code = "internal"))]
    EncodeMetrics { source: prometheus::Error },
}

impl ErrorExt for ApiError {
    fn status_code(&self) -> StatusCode {
        self.get_str("status_code")
            .and_then(|value| value.parse().ok())
            .unwrap_or(StatusCode::Unknown)
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

impl StackError for ApiError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { buf.push(format!("{layer}: {self}")) }

    fn next(&self) -> Option<&dyn StackError> { None }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if !status.is_client_visible() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ErrorBody {
            code:    status,
            message: self.output_msg(),
        });
        (status.http_status(), body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message_is_bad_request() {
        let err = ApiError::EmptyMessage {
            queue: "q".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
        assert_eq!(err.status_code().http_status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.output_msg(), "Message for queue 'q' is empty");
    }
}

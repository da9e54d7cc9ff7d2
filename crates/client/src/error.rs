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

use snafu::Snafu;

/// Queue transport failures.
///
/// An empty queue is not an error; `dequeue` reports it as `Ok(None)`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    #[snafu(display("Invalid queue service URL '{url}'"))]
    InvalidQueueUrl {
        url:    String,
        source: <reqwest::Url as std::str::FromStr>::Err,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Queue service URL '{url}' cannot carry a path"))]
    UnsupportedQueueUrl {
        url: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to build HTTP client"))]
    BuildClient {
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{op} request for queue '{queue}' failed"))]
    Request {
        op:     &'static str,
        queue:  String,
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{op} on queue '{queue}' failed: {status}: {body}"))]
    UnexpectedStatus {
        op:     &'static str,
        queue:  String,
        status: reqwest::StatusCode,
        body:   String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Missing {header} header in length response for queue '{queue}'"))]
    MissingLengthHeader {
        header: &'static str,
        queue:  String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid {header} header '{value}' for queue '{queue}'"))]
    InvalidLengthHeader {
        header: &'static str,
        queue:  String,
        value:  String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

/// Result type for queue client operations.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

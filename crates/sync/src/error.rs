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

use std::path::PathBuf;

use lineq_client::ClientError;
use snafu::Snafu;

/// Failures of one producer, drain or watch run.
///
/// [`SyncError::Cancelled`] travels the same channel as real failures; use
/// [`SyncError::is_cancelled`] to tell a requested shutdown apart.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SyncError {
    #[snafu(display("Operation cancelled"))]
    Cancelled {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to open {}", path.display()))]
    OpenFile {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to stat {}", path.display()))]
    StatFile {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to seek {} to offset {offset}", path.display()))]
    SeekFile {
        path:   PathBuf,
        offset: u64,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to read {}", path.display()))]
    ReadFile {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Queue transport failed for '{queue}'"))]
    Transport {
        queue:  String,
        source: ClientError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to write drained data"))]
    WriteSink {
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to create output {}", path.display()))]
    CreateOutput {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to read directory {}", path.display()))]
    ReadDir {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to move {} to dead-letter directory {}", path.display(), dir.display()))]
    DeadLetter {
        path:   PathBuf,
        dir:    PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{task} task for {} did not finish", path.display()))]
    TaskJoin {
        task:   &'static str,
        path:   PathBuf,
        source: tokio::task::JoinError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

impl SyncError {
    pub const fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled { .. }) }
}

/// Result type for sync operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

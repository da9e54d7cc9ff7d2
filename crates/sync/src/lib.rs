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

//! File-to-queue synchronization.
//!
//! A file travels through a named queue in two halves that only share the
//! queue itself:
//!
//! - a producer ([`run_whole_file_producer`] or [`run_streaming_producer`])
//!   enqueues the file line by line,
//! - a drain ([`run_drain_coordinator`]) dequeues into an output sink and
//!   stops once the producer has signalled [`ProducerDone`] and the queue
//!   length reads zero.
//!
//! [`run_pipeline`] pairs the two for one file; [`run_directory_watch`]
//! launches one pairing per file that stops growing in a watched directory.

pub mod config;
pub mod drain;
pub mod error;
mod metrics;
pub mod naming;
pub mod pipeline;
pub mod producer;
pub mod signal;
pub mod tailer;
pub mod watcher;

pub use config::{DrainConfig, FailurePolicy, PipelineConfig, ProducerMode, TailConfig, WatchConfig};
pub use drain::{DrainReport, discard_backlog, run_drain_coordinator};
pub use error::{Result, SyncError};
pub use naming::{PrefixedQueueName, QueueNameBuilder, sanitize_queue_name};
pub use pipeline::{FileJob, QueuePipeline, run_pipeline};
pub use producer::run_whole_file_producer;
pub use signal::ProducerDone;
pub use tailer::{PollOutcome, TailCursor, Tailer, run_streaming_producer};
pub use watcher::{DirectoryWatcher, FileProcessor, Phase, WatchTable, run_directory_watch};

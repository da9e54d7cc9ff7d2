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

//! Tunables for the tailer, the drain loop and the directory watcher.
//!
//! Every struct deserializes from a partial document: missing keys take the
//! defaults below. Durations use humantime notation (`"300ms"`, `"2s"`).

use std::{path::PathBuf, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// How long the tailer sleeps when a poll found no new bytes.
pub const DEFAULT_TAIL_POLL_INTERVAL: Duration = Duration::from_millis(300);
/// Size of each read from the tailed file.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
/// How long the drain loop sleeps after an empty dequeue.
pub const DEFAULT_DRAIN_IDLE_INTERVAL: Duration = Duration::from_millis(10);
/// Interval between directory scans.
pub const DEFAULT_WATCH_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Consecutive equal-size scans before a file counts as complete.
pub const DEFAULT_STABILITY_THRESHOLD: u32 = 1;
/// Prefix of every per-file queue name.
pub const DEFAULT_BASE_QUEUE_NAME: &str = "lines";
pub const DEFAULT_WATCH_DIR: &str = "data/in";
pub const DEFAULT_OUT_DIR: &str = "data/out";
/// One attempt per file: a failed file is not retried.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, SmartDefault, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    #[default(_code = "DEFAULT_TAIL_POLL_INTERVAL")]
    #[builder(default = DEFAULT_TAIL_POLL_INTERVAL)]
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    #[default(_code = "DEFAULT_CHUNK_SIZE")]
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, SmartDefault, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    #[default(_code = "DEFAULT_DRAIN_IDLE_INTERVAL")]
    #[builder(default = DEFAULT_DRAIN_IDLE_INTERVAL)]
    #[serde(with = "humantime_serde")]
    pub idle_interval: Duration,
}

/// Which producer feeds the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerMode {
    /// Read the file once to EOF, including a final unterminated line.
    #[default]
    WholeFile,
    /// Keep following the file until cancelled.
    Streaming,
}

/// One producer/drain pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[builder(default)]
    pub mode:  ProducerMode,
    #[builder(default)]
    pub tail:  TailConfig,
    #[builder(default)]
    pub drain: DrainConfig,
}

/// What happens to a file whose pipeline failed.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    /// Pipeline runs allowed per file. A failed file goes back to tracking
    /// until this many attempts were made.
    #[default(_code = "DEFAULT_MAX_ATTEMPTS")]
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Receives a copy of every file that used up its attempts.
    #[builder(into)]
    pub dead_letter_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    #[default(_code = "PathBuf::from(DEFAULT_WATCH_DIR)")]
    #[builder(into, default = PathBuf::from(DEFAULT_WATCH_DIR))]
    pub dir: PathBuf,

    #[default(_code = "PathBuf::from(DEFAULT_OUT_DIR)")]
    #[builder(into, default = PathBuf::from(DEFAULT_OUT_DIR))]
    pub out_dir: PathBuf,

    #[default(_code = "DEFAULT_WATCH_POLL_INTERVAL")]
    #[builder(default = DEFAULT_WATCH_POLL_INTERVAL)]
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    #[default(_code = "DEFAULT_STABILITY_THRESHOLD")]
    #[builder(default = DEFAULT_STABILITY_THRESHOLD)]
    pub stability_threshold: u32,

    #[default(_code = "DEFAULT_BASE_QUEUE_NAME.to_string()")]
    #[builder(into, default = DEFAULT_BASE_QUEUE_NAME.to_string())]
    pub base_queue_name: String,

    #[builder(default)]
    pub failure_policy: FailurePolicy,

    #[builder(default)]
    pub pipeline: PipelineConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.stability_threshold, 1);
        assert_eq!(config.base_queue_name, "lines");
        assert_eq!(config.out_dir, PathBuf::from("data/out"));
        assert_eq!(config.failure_policy.max_attempts, 1);
        assert!(config.failure_policy.dead_letter_dir.is_none());
        assert_eq!(config.pipeline.mode, ProducerMode::WholeFile);
        assert_eq!(config.pipeline.tail.poll_interval, Duration::from_millis(300));
        assert_eq!(config.pipeline.drain.idle_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_builder_matches_default() {
        assert_eq!(WatchConfig::builder().build(), WatchConfig::default());
        assert_eq!(TailConfig::builder().build(), TailConfig::default());
        assert_eq!(PipelineConfig::builder().build(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: WatchConfig = serde_json::from_str(
            r#"{"dir": "/srv/in", "poll_interval": "2s", "pipeline": {"mode": "streaming"}}"#,
        )
        .unwrap();
        assert_eq!(config.dir, PathBuf::from("/srv/in"));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.pipeline.mode, ProducerMode::Streaming);
        assert_eq!(config.pipeline.tail.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.stability_threshold, 1);
    }
}

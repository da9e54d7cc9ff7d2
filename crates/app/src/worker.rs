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

//! Entry points for the file-sync commands.
//!
//! Each one runs until its work is done or `cancel` fires. A cancellation is
//! a normal way to stop and maps to `Ok(())`; only real failures come back
//! as errors.

use std::path::{Path, PathBuf};

use lineq_client::QueueClient;
use lineq_sync::{
    DrainConfig, FileJob, PipelineConfig, PrefixedQueueName, ProducerDone, ProducerMode, SyncError,
    TailConfig, WatchConfig, run_directory_watch, run_drain_coordinator, run_pipeline,
    run_streaming_producer, run_whole_file_producer,
};
use snafu::{ResultExt, Whatever};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where `drain` writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainTarget {
    Stdout,
    File(PathBuf),
}

/// Treats cancellation as success.
fn settle<T>(what: &str, result: Result<T, SyncError>) -> Result<Option<T>, Whatever> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_cancelled() => {
            info!("{what} stopped by shutdown request");
            Ok(None)
        }
        Err(e) => Err(e).with_whatever_context(|_| format!("{what} failed")),
    }
}

/// Sends `path` to the client's queue, once or following appends.
pub async fn produce(
    path: &Path,
    client: &QueueClient,
    mode: ProducerMode,
    tail: &TailConfig,
    cancel: &CancellationToken,
) -> Result<(), Whatever> {
    let result = match mode {
        ProducerMode::WholeFile => run_whole_file_producer(path, client, cancel).await,
        ProducerMode::Streaming => run_streaming_producer(path, client, tail, cancel).await,
    };
    settle("producer", result).map(|_| ())
}

/// Empties the client's queue into `target`.
///
/// Without `follow` the queue is assumed complete and the drain stops at
/// the first zero length; with it the drain keeps consuming until
/// cancelled.
pub async fn drain(
    client: &QueueClient,
    target: &DrainTarget,
    follow: bool,
    config: &DrainConfig,
    cancel: &CancellationToken,
) -> Result<(), Whatever> {
    let done = ProducerDone::new();
    if !follow {
        done.signal();
    }
    let result = match target {
        DrainTarget::Stdout => {
            drain_into(client, &mut tokio::io::stdout(), &done, config, cancel).await
        }
        DrainTarget::File(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_whatever_context(|_| format!("Failed to create {}", path.display()))?;
            drain_into(client, &mut file, &done, config, cancel).await
        }
    };
    settle("drain", result).map(|_| ())
}

async fn drain_into<W>(
    client: &QueueClient,
    sink: &mut W,
    done: &ProducerDone,
    config: &DrainConfig,
    cancel: &CancellationToken,
) -> Result<(), SyncError>
where
    W: AsyncWrite + Unpin,
{
    let report = run_drain_coordinator(client, sink, done, config, cancel).await?;
    info!(messages = report.messages, bytes = report.bytes, "drain complete");
    Ok(())
}

/// Moves one file through `queue` into `output`.
pub async fn pipe(
    source: PathBuf,
    output: PathBuf,
    client: &QueueClient,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<(), Whatever> {
    let job = FileJob {
        queue: client.queue().to_string(),
        source,
        output,
    };
    settle("pipeline", run_pipeline(&job, client, config, cancel).await).map(|_| ())
}

/// Watches a directory until cancelled.
pub async fn watch(
    config: WatchConfig,
    client: QueueClient,
    cancel: CancellationToken,
) -> Result<(), Whatever> {
    let naming = PrefixedQueueName::new(&config.base_queue_name);
    settle("watcher", run_directory_watch(config, client, naming, cancel).await).map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use lineq_common_storage_queue::QueueRegistry;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_produce_then_drain_to_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&source, "a\nb\nc").unwrap();

        let client = QueueClient::local(Arc::new(QueueRegistry::new()), "lines");
        let cancel = CancellationToken::new();
        produce(&source, &client, ProducerMode::WholeFile, &TailConfig::default(), &cancel)
            .await
            .unwrap();
        drain(&client, &DrainTarget::File(output.clone()), false, &DrainConfig::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"a\nb\nc");
        assert_eq!(client.length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_follow_drain_is_ok() {
        let dir = TempDir::new().unwrap();
        let client = QueueClient::local(Arc::new(QueueRegistry::new()), "lines");
        let cancel = CancellationToken::new();
        let target = DrainTarget::File(dir.path().join("out"));

        let task = tokio::spawn({
            let (client, cancel) = (client.clone(), cancel.clone());
            async move {
                drain(&client, &target, true, &DrainConfig::default(), &cancel)
                    .await
                    .map_err(|e| e.to_string())
            }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_pipe_missing_source_is_error() {
        let dir = TempDir::new().unwrap();
        let client = QueueClient::local(Arc::new(QueueRegistry::new()), "lines");
        let result = pipe(
            dir.path().join("missing"),
            dir.path().join("out"),
            &client,
            &PipelineConfig::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }
}

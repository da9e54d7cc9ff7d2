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

//! One producer plus one drain for one file.

use std::path::PathBuf;

use async_trait::async_trait;
use lineq_client::QueueClient;
use snafu::ResultExt;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::{PipelineConfig, ProducerMode},
    drain::{DrainReport, discard_backlog, run_drain_coordinator},
    error::{CancelledSnafu, CreateOutputSnafu, Result, TaskJoinSnafu},
    producer::run_whole_file_producer,
    signal::ProducerDone,
    tailer::run_streaming_producer,
    watcher::FileProcessor,
};

/// A file to move through a queue into an output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub queue:  String,
}

/// Runs the producer for `job.source` and the drain into `job.output`
/// concurrently over `job.queue`.
///
/// The queue must start empty, so anything left on it (an earlier failed
/// attempt for the same file) is discarded first. Whichever side fails first
/// stops the other, and the messages it left behind are discarded too. A real
/// error from either side wins over a cancellation; the producer's error is
/// reported first when both failed.
pub async fn run_pipeline(
    job: &FileJob,
    client: &QueueClient,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<DrainReport> {
    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .context(CreateOutputSnafu { path: parent })?;
    }
    let mut output = File::create(&job.output)
        .await
        .context(CreateOutputSnafu { path: &job.output })?;

    let client = client.with_queue(&job.queue);
    discard_backlog(&client, cancel).await?;
    let token = cancel.child_token();
    let done = ProducerDone::new();
    info!(
        source = %job.source.display(),
        output = %job.output.display(),
        queue = %job.queue,
        mode = ?config.mode,
        "pipeline started"
    );

    let producer = tokio::spawn({
        let (client, token, done) = (client.clone(), token.clone(), done.clone());
        let source = job.source.clone();
        let config = *config;
        async move {
            let guard = done.guard();
            let result = match config.mode {
                ProducerMode::WholeFile => run_whole_file_producer(&source, &client, &token).await,
                ProducerMode::Streaming => {
                    run_streaming_producer(&source, &client, &config.tail, &token).await
                }
            };
            if result.is_err() {
                guard.disarm();
                token.cancel();
            }
            result
        }
    });

    let drained = run_drain_coordinator(&client, &mut output, &done, &config.drain, &token).await;
    if drained.is_err() {
        token.cancel();
    }
    let produced = producer.await.context(TaskJoinSnafu {
        task: "producer",
        path: &job.source,
    })?;

    match (produced, drained) {
        (Ok(()), Ok(report)) => {
            info!(
                source = %job.source.display(),
                messages = report.messages,
                bytes = report.bytes,
                "pipeline finished"
            );
            Ok(report)
        }
        (Err(e), _) | (_, Err(e)) if !e.is_cancelled() => {
            warn!(source = %job.source.display(), error = %e, "pipeline failed");
            if let Err(cleanup) = discard_backlog(&client, cancel).await {
                warn!(queue = %job.queue, error = %cleanup, "could not discard leftover messages");
            }
            Err(e)
        }
        _ => CancelledSnafu.fail(),
    }
}

/// [`FileProcessor`] that runs [`run_pipeline`] for every job.
#[derive(Debug, Clone)]
pub struct QueuePipeline {
    client: QueueClient,
    config: PipelineConfig,
}

impl QueuePipeline {
    pub const fn new(client: QueueClient, config: PipelineConfig) -> Self { Self { client, config } }
}

#[async_trait]
impl FileProcessor for QueuePipeline {
    async fn process(&self, job: FileJob, cancel: CancellationToken) -> Result<()> {
        run_pipeline(&job, &self.client, &self.config, &cancel)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use bytes::Bytes;
    use lineq_client::{QueueTransport, StatusCode, error::UnexpectedStatusSnafu};
    use lineq_common_storage_queue::QueueRegistry;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        DirectoryWatcher, Phase, SyncError,
        config::{FailurePolicy, TailConfig, WatchConfig},
    };

    /// Rejects the third enqueue it ever sees and answers dequeues slowly, so
    /// the first attempt fails with lines still queued.
    struct ThirdEnqueueFails {
        registry:      Arc<QueueRegistry>,
        enqueues:      AtomicUsize,
        dequeue_delay: Duration,
    }

    impl ThirdEnqueueFails {
        fn new(registry: Arc<QueueRegistry>) -> Self {
            Self {
                registry,
                enqueues: AtomicUsize::new(0),
                dequeue_delay: Duration::from_millis(100),
            }
        }
    }

    #[async_trait]
    impl QueueTransport for ThirdEnqueueFails {
        async fn enqueue(&self, queue: &str, payload: Bytes) -> lineq_client::Result<()> {
            if self.enqueues.fetch_add(1, Ordering::SeqCst) == 2 {
                return UnexpectedStatusSnafu {
                    op: "enqueue",
                    queue,
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: "try again",
                }
                .fail();
            }
            self.registry.enqueue(queue, payload);
            Ok(())
        }

        async fn dequeue(&self, queue: &str) -> lineq_client::Result<Option<Bytes>> {
            tokio::time::sleep(self.dequeue_delay).await;
            Ok(self.registry.dequeue(queue))
        }

        async fn length(&self, queue: &str) -> lineq_client::Result<usize> { Ok(self.registry.len(queue)) }
    }

    fn job(dir: &TempDir, name: &str) -> FileJob {
        FileJob {
            source: dir.path().join("in").join(name),
            output: dir.path().join("out").join(name),
            queue:  format!("lines-{name}"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, "abc.txt");
        std::fs::create_dir_all(job.source.parent().unwrap()).unwrap();
        std::fs::write(&job.source, "a\nb\nc").unwrap();

        let registry = Arc::new(QueueRegistry::new());
        let client = QueueClient::local(Arc::clone(&registry), "unused");
        let report = run_pipeline(&job, &client, &PipelineConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&job.output).unwrap(), b"a\nb\nc");
        assert_eq!(report.messages, 3);
        assert_eq!(report.bytes, 5);
        assert_eq!(registry.len(&job.queue), 0);
        assert_eq!(registry.len("unused"), 0);
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_hanging() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, "ghost.txt");
        let client = QueueClient::local(Arc::new(QueueRegistry::new()), "q");

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            run_pipeline(&job, &client, &PipelineConfig::default(), &CancellationToken::new()),
        )
        .await
        .expect("pipeline hung after producer failure")
        .unwrap_err();
        assert!(matches!(err, SyncError::OpenFile { .. }));
    }

    #[tokio::test]
    async fn test_streaming_pipeline_runs_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, "stream.log");
        std::fs::create_dir_all(job.source.parent().unwrap()).unwrap();
        std::fs::write(&job.source, "x\ny\n").unwrap();

        let config = PipelineConfig::builder()
            .mode(ProducerMode::Streaming)
            .tail(TailConfig::builder().poll_interval(Duration::from_millis(5)).build())
            .build();
        let client = QueueClient::local(Arc::new(QueueRegistry::new()), "q");
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let (job, cancel) = (job.clone(), cancel.clone());
            async move { run_pipeline(&job, &client, &config, &cancel).await }
        });

        for _ in 0..200 {
            if std::fs::read(&job.output).is_ok_and(|data| data == b"x\ny\n") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(std::fs::read(&job.output).unwrap(), b"x\ny\n");
    }

    #[tokio::test]
    async fn test_stale_messages_never_reach_output() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, "abc.txt");
        std::fs::create_dir_all(job.source.parent().unwrap()).unwrap();
        std::fs::write(&job.source, "a\nb\nc").unwrap();

        let registry = Arc::new(QueueRegistry::new());
        registry.enqueue(&job.queue, "stale-1\n");
        registry.enqueue(&job.queue, "stale-2\n");
        let client = QueueClient::local(Arc::clone(&registry), "unused");

        let report = run_pipeline(&job, &client, &PipelineConfig::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&job.output).unwrap(), b"a\nb\nc");
        assert_eq!(report.messages, 3);
        assert_eq!(registry.len(&job.queue), 0);
    }

    #[tokio::test]
    async fn test_retry_after_failed_attempt_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, "abc.txt");
        std::fs::create_dir_all(job.source.parent().unwrap()).unwrap();
        std::fs::write(&job.source, "a\nb\nc").unwrap();

        let registry = Arc::new(QueueRegistry::new());
        let transport = Arc::new(ThirdEnqueueFails::new(Arc::clone(&registry)));
        let client = QueueClient::new(transport, "unused");
        let config = PipelineConfig::default();

        let err = run_pipeline(&job, &client, &config, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }), "{err:?}");
        assert_eq!(registry.len(&job.queue), 0);

        run_pipeline(&job, &client, &config, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&job.output).unwrap(), b"a\nb\nc");
        assert_eq!(registry.len(&job.queue), 0);
    }

    #[tokio::test]
    async fn test_watcher_retry_through_queue_pipeline() {
        let dir = TempDir::new().unwrap();
        let config = WatchConfig::builder()
            .dir(dir.path().join("in"))
            .out_dir(dir.path().join("out"))
            .failure_policy(FailurePolicy::builder().max_attempts(2).build())
            .build();
        std::fs::create_dir_all(&config.dir).unwrap();
        let source = config.dir.join("abc.txt");
        std::fs::write(&source, "a\nb\nc").unwrap();
        let output = config.out_dir.join("abc.txt");

        let registry = Arc::new(QueueRegistry::new());
        let transport = Arc::new(ThirdEnqueueFails::new(Arc::clone(&registry)));
        let processor = Arc::new(QueuePipeline::new(
            QueueClient::new(transport, "unused"),
            config.pipeline,
        ));
        let mut watcher = DirectoryWatcher::new(config, processor);
        let cancel = CancellationToken::new();

        watcher.scan_once(&cancel).await.unwrap();
        assert_eq!(watcher.scan_once(&cancel).await.unwrap(), 1);
        watcher.join_in_flight().await;
        assert_eq!(watcher.table().phase(&source), Phase::Tracking);

        assert_eq!(watcher.scan_once(&cancel).await.unwrap(), 1);
        watcher.join_in_flight().await;
        assert_eq!(watcher.table().phase(&source), Phase::Done);
        assert_eq!(std::fs::read(&output).unwrap(), b"a\nb\nc");
        assert!(registry.stats().iter().all(|stats| stats.length == 0));
    }
}

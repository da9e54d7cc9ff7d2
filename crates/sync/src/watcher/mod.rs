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

//! Directory polling loop.
//!
//! Every tick lists the watch directory, feeds each regular file's size to
//! the [`WatchTable`] and launches a [`FileProcessor`] for files that stopped
//! growing. Each launch runs in its own task; a failing or panicking job
//! only affects its own file.

mod state;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use lineq_client::QueueClient;
use snafu::ResultExt;
pub use state::{FileWatchState, Observation, Phase, WatchTable};
use tokio::{task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{FailurePolicy, WatchConfig},
    error::{CancelledSnafu, DeadLetterSnafu, ReadDirSnafu, Result},
    metrics::{FILES_DISCOVERED, PIPELINES_FAILED, PIPELINES_LAUNCHED, PIPELINES_SUCCEEDED},
    naming::{PrefixedQueueName, QueueNameBuilder},
    pipeline::{FileJob, QueuePipeline},
};

/// Work done for one stable file.
#[async_trait]
pub trait FileProcessor: Send + Sync + 'static {
    async fn process(&self, job: FileJob, cancel: CancellationToken) -> Result<()>;
}

pub struct DirectoryWatcher {
    config:    WatchConfig,
    processor: Arc<dyn FileProcessor>,
    naming:    Arc<dyn QueueNameBuilder>,
    table:     Arc<WatchTable>,
    in_flight: JoinSet<()>,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("dir", &self.config.dir)
            .field("tracked", &self.table.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Queue names default to `"{base_queue_name}-{sanitized file name}"`.
    pub fn new(config: WatchConfig, processor: Arc<dyn FileProcessor>) -> Self {
        let naming = Arc::new(PrefixedQueueName::new(config.base_queue_name.clone()));
        let table = Arc::new(WatchTable::new(
            config.stability_threshold,
            config.failure_policy.max_attempts,
        ));
        Self {
            config,
            processor,
            naming,
            table,
            in_flight: JoinSet::new(),
        }
    }

    #[must_use]
    pub fn with_queue_names(mut self, naming: impl QueueNameBuilder) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn table(&self) -> &WatchTable { &self.table }

    pub fn in_flight(&self) -> usize { self.in_flight.len() }

    /// One pass over the directory. Returns how many pipelines it launched.
    ///
    /// A directory that cannot be listed leaves every file's state as it
    /// was.
    pub async fn scan_once(&mut self, cancel: &CancellationToken) -> Result<usize> {
        let files = list_files(&self.config.dir).await?;
        let mut launched = 0;
        for (path, size) in files {
            match self.table.observe(&path, size) {
                Observation::Discovered => {
                    FILES_DISCOVERED.inc();
                    debug!(path = %path.display(), size, "discovered file");
                }
                Observation::Launch => {
                    self.launch(path, cancel);
                    launched += 1;
                }
                Observation::Changed | Observation::Stable | Observation::Skipped => {}
            }
        }
        Ok(launched)
    }

    /// Waits for every launched pipeline to finish.
    pub async fn join_in_flight(&mut self) { while self.in_flight.join_next().await.is_some() {} }

    /// Scans every `poll_interval` until `cancel` fires, then waits for the
    /// pipelines still running (they see the same cancellation) and returns
    /// [`SyncError::Cancelled`](crate::SyncError::Cancelled).
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            dir = %self.config.dir.display(),
            out_dir = %self.config.out_dir.display(),
            poll_interval = ?self.config.poll_interval,
            threshold = self.config.stability_threshold,
            "watching directory"
        );
        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => break,
            }
            if let Err(e) = self.scan_once(&cancel).await {
                warn!(dir = %self.config.dir.display(), error = %e, "directory scan failed, skipping tick");
            }
            while self.in_flight.try_join_next().is_some() {}
        }

        info!(in_flight = self.in_flight.len(), "watcher stopping");
        self.join_in_flight().await;
        CancelledSnafu.fail()
    }

    fn launch(&mut self, path: PathBuf, cancel: &CancellationToken) {
        let Some(file_name) = path.file_name().map(ToOwned::to_owned) else {
            return;
        };
        let job = FileJob {
            queue:  self.naming.queue_name(&file_name.to_string_lossy()),
            output: self.config.out_dir.join(&file_name),
            source: path.clone(),
        };
        info!(
            path = %path.display(),
            queue = %job.queue,
            output = %job.output.display(),
            "launching pipeline"
        );
        PIPELINES_LAUNCHED.inc();

        let processor = Arc::clone(&self.processor);
        let table = Arc::clone(&self.table);
        let policy = self.config.failure_policy.clone();
        let token = cancel.clone();
        self.in_flight.spawn(async move {
            // Own task so a panicking job still reaches `complete`.
            let outcome = tokio::spawn(async move { processor.process(job, token).await }).await;
            let (succeeded, cancelled) = match outcome {
                Ok(Ok(())) => (true, false),
                Ok(Err(e)) if e.is_cancelled() => {
                    debug!(path = %path.display(), "pipeline cancelled");
                    (false, true)
                }
                Ok(Err(e)) => {
                    warn!(path = %path.display(), error = %e, "pipeline failed");
                    (false, false)
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "pipeline panicked");
                    (false, false)
                }
            };
            if succeeded {
                PIPELINES_SUCCEEDED.inc();
            } else if !cancelled {
                PIPELINES_FAILED.inc();
            }

            let phase = table.complete(&path, succeeded);
            debug!(path = %path.display(), ?phase, "pipeline finished");
            if phase == Phase::Done && !succeeded && !cancelled {
                dead_letter(&path, &policy).await;
            }
        });
    }
}

/// Non-hidden regular files with their sizes, sorted by path.
async fn list_files(dir: &Path) -> Result<Vec<(PathBuf, u64)>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .context(ReadDirSnafu { path: dir })?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context(ReadDirSnafu { path: dir })?
    {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        // Vanished between listing and stat.
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if metadata.is_file() {
            files.push((entry.path(), metadata.len()));
        }
    }
    files.sort();
    Ok(files)
}

async fn dead_letter(path: &Path, policy: &FailurePolicy) {
    let Some(dir) = policy.dead_letter_dir.as_deref() else {
        return;
    };
    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        let target = dir.join(path.file_name().unwrap_or_default());
        tokio::fs::copy(path, &target).await
    }
    .await
    .context(DeadLetterSnafu { path, dir });
    match result {
        Ok(_) => info!(path = %path.display(), dir = %dir.display(), "copied failed file to dead-letter dir"),
        Err(e) => error!(error = %e, "dead-lettering failed"),
    }
}

/// Watches `config.dir` and runs one producer/drain pipeline per stable file
/// through `client`, until `cancel` fires.
///
/// `naming` picks each file's queue; pass
/// [`PrefixedQueueName::new(&config.base_queue_name)`](PrefixedQueueName) for
/// the default `"{base}-{file}"` scheme.
pub async fn run_directory_watch(
    config: WatchConfig,
    client: QueueClient,
    naming: impl QueueNameBuilder,
    cancel: CancellationToken,
) -> Result<()> {
    let processor = Arc::new(QueuePipeline::new(client, config.pipeline));
    DirectoryWatcher::new(config, processor)
        .with_queue_names(naming)
        .run(cancel)
        .await
}

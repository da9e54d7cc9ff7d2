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

use std::{io::ErrorKind, path::Path};

use lineq_client::QueueClient;
use snafu::IntoError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{OpenFileSnafu, Result},
    tailer::{PollOutcome, Tailer},
};

/// Enqueues every line of a complete file, then its unterminated last line
/// if it has one.
///
/// Unlike the streaming producer a missing file is an error here.
pub async fn run_whole_file_producer(
    path: impl AsRef<Path>,
    client: &QueueClient,
    cancel: &CancellationToken,
) -> Result<()> {
    let path = path.as_ref();
    let mut tailer = Tailer::new(path, client.clone());
    if tailer.finish(cancel).await? == PollOutcome::Missing {
        return Err(OpenFileSnafu { path }.into_error(ErrorKind::NotFound.into()));
    }
    debug!(
        path = %path.display(),
        queue = client.queue(),
        bytes = tailer.cursor().offset(),
        "file enqueued"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lineq_common_storage_queue::QueueRegistry;
    use tempfile::TempDir;

    use super::*;
    use crate::SyncError;

    #[tokio::test]
    async fn test_whole_file_includes_final_fragment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "a\nb\nc").unwrap();

        let registry = Arc::new(QueueRegistry::new());
        let client = QueueClient::local(Arc::clone(&registry), "q");
        run_whole_file_producer(&path, &client, &CancellationToken::new())
            .await
            .unwrap();

        let units: Vec<_> = std::iter::from_fn(|| registry.dequeue("q")).collect();
        assert_eq!(units, vec!["a\n", "b\n", "c"]);
    }

    #[tokio::test]
    async fn test_empty_file_enqueues_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        let registry = Arc::new(QueueRegistry::new());
        let client = QueueClient::local(Arc::clone(&registry), "q");
        run_whole_file_producer(&path, &client, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(registry.len("q"), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(QueueRegistry::new());
        let client = QueueClient::local(registry, "q");
        let err = run_whole_file_producer(dir.path().join("nope"), &client, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::OpenFile { .. }));
    }
}

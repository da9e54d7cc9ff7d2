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

//! Incremental line reader for a file that keeps growing.
//!
//! A [`Tailer`] owns a [`TailCursor`]: the byte offset already consumed and
//! the bytes of a line that has not seen its `\n` yet. Each
//! [`poll`](Tailer::poll_once) reopens the file, reads whatever lies between
//! the offset and the current size, and enqueues every completed line,
//! newline included, one message per line and in file order.
//!
//! A file that shrinks below the offset was truncated or replaced: the
//! cursor starts over at byte 0 and the half-read line is dropped. Lines
//! already sent stay sent.

use std::{
    io::{ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};

use bytes::{Bytes, BytesMut};
use lineq_client::QueueClient;
use snafu::{OptionExt, ResultExt};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    config::{DEFAULT_CHUNK_SIZE, TailConfig},
    error::{
        CancelledSnafu, OpenFileSnafu, ReadFileSnafu, Result, SeekFileSnafu, StatFileSnafu,
        TransportSnafu,
    },
    metrics::{LINES_ENQUEUED, TAILER_TRUNCATIONS},
    signal::sleep_or_cancel,
};

/// Read position plus the unterminated tail of the last read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TailCursor {
    offset:  u64,
    pending: BytesMut,
}

impl TailCursor {
    pub const fn offset(&self) -> u64 { self.offset }

    /// Bytes read past the last `\n`.
    pub fn pending(&self) -> &[u8] { &self.pending }

    /// Consumes `chunk` and returns the lines it completed.
    ///
    /// The pending bytes never contain `\n`, so the search starts at the
    /// first new byte.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.offset += chunk.len() as u64;
        let mut scanned = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending[scanned..].iter().position(|&b| b == b'\n') {
            lines.push(self.pending.split_to(scanned + pos + 1).freeze());
            scanned = 0;
        }
        lines
    }

    /// Forgets everything; the next read starts at byte 0.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
    }

    /// Removes the unterminated fragment, if any.
    pub fn take_pending(&mut self) -> Option<Bytes> {
        (!self.pending.is_empty()).then(|| self.pending.split().freeze())
    }
}

/// Result of one [`Tailer::poll_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The file does not exist (yet, or any more).
    Missing,
    /// Number of new bytes consumed; zero means nothing was appended.
    Read(u64),
}

#[derive(Debug)]
pub struct Tailer {
    path:       PathBuf,
    client:     QueueClient,
    chunk_size: usize,
    cursor:     TailCursor,
}

impl Tailer {
    pub fn new(path: impl Into<PathBuf>, client: QueueClient) -> Self {
        Self {
            path: path.into(),
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            cursor: TailCursor::default(),
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn path(&self) -> &Path { &self.path }

    pub const fn cursor(&self) -> &TailCursor { &self.cursor }

    /// Reads everything appended since the last call and enqueues the
    /// completed lines.
    ///
    /// Only the bytes present at stat time are read, so a writer racing
    /// with this call is picked up by the next poll.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<PollOutcome> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PollOutcome::Missing),
            Err(e) => return Err(e).context(OpenFileSnafu { path: &self.path }),
        };
        let size = file
            .metadata()
            .await
            .context(StatFileSnafu { path: &self.path })?
            .len();

        let offset = self.cursor.offset();
        if size < offset {
            warn!(
                path = %self.path.display(),
                offset,
                size,
                dropped = self.cursor.pending().len(),
                "file shrank below read offset, restarting from the beginning"
            );
            TAILER_TRUNCATIONS.inc();
            self.cursor.reset();
        }

        let offset = self.cursor.offset();
        if size == offset {
            return Ok(PollOutcome::Read(0));
        }

        file.seek(SeekFrom::Start(offset))
            .await
            .context(SeekFileSnafu {
                path: &self.path,
                offset,
            })?;

        let mut reader = file.take(size - offset);
        let mut buf = vec![0u8; self.chunk_size];
        let mut read = 0u64;
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .context(ReadFileSnafu { path: &self.path })?;
            if n == 0 {
                break;
            }
            read += n as u64;
            for line in self.cursor.feed(&buf[..n]) {
                self.send(line, cancel).await?;
            }
        }

        trace!(path = %self.path.display(), offset = self.cursor.offset(), bytes = read, "polled");
        Ok(PollOutcome::Read(read))
    }

    /// Reads to the current end of file, then sends the unterminated last
    /// line as a final message.
    ///
    /// Only for files known to be complete; a streaming tailer never calls
    /// this.
    pub async fn finish(&mut self, cancel: &CancellationToken) -> Result<PollOutcome> {
        let outcome = self.poll_once(cancel).await?;
        if let Some(rest) = self.cursor.take_pending() {
            debug!(path = %self.path.display(), bytes = rest.len(), "flushing final unterminated line");
            self.send(rest, cancel).await?;
        }
        Ok(outcome)
    }

    /// Polls until cancelled, sleeping `poll_interval` whenever a poll finds
    /// nothing new or the file is missing.
    ///
    /// Only returns on error; cancellation is [`SyncError::Cancelled`](crate::SyncError::Cancelled).
    pub async fn run(
        &mut self,
        poll_interval: std::time::Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(path = %self.path.display(), queue = self.client.queue(), "tailing file");
        loop {
            if cancel.is_cancelled() {
                return CancelledSnafu.fail();
            }
            match self.poll_once(cancel).await? {
                PollOutcome::Read(n) if n > 0 => continue,
                PollOutcome::Missing => {
                    trace!(path = %self.path.display(), "file not found, waiting");
                }
                PollOutcome::Read(_) => {}
            }
            if !sleep_or_cancel(poll_interval, cancel).await {
                return CancelledSnafu.fail();
            }
        }
    }

    async fn send(&self, line: Bytes, cancel: &CancellationToken) -> Result<()> {
        cancel
            .run_until_cancelled(self.client.enqueue(line))
            .await
            .context(CancelledSnafu)?
            .context(TransportSnafu {
                queue: self.client.queue(),
            })?;
        LINES_ENQUEUED.inc();
        Ok(())
    }
}

/// Follows `path` and enqueues each completed line on `client` until
/// `cancel` fires.
///
/// A missing file is waited for. Any other I/O or transport error ends the
/// run. The trailing partial line is never sent.
pub async fn run_streaming_producer(
    path: impl AsRef<Path>,
    client: &QueueClient,
    config: &TailConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    Tailer::new(path.as_ref(), client.clone())
        .with_chunk_size(config.chunk_size)
        .run(config.poll_interval, cancel)
        .await
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use lineq_common_storage_queue::QueueRegistry;
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    fn drain_all(registry: &QueueRegistry, queue: &str) -> Vec<Bytes> {
        std::iter::from_fn(|| registry.dequeue(queue)).collect()
    }

    #[test]
    fn test_cursor_splits_lines_across_chunks() {
        let mut cursor = TailCursor::default();
        assert!(cursor.feed(b"li").is_empty());
        assert_eq!(cursor.feed(b"ne1\nline"), vec![Bytes::from_static(b"line1\n")]);
        assert_eq!(cursor.pending(), b"line");
        assert_eq!(
            cursor.feed(b"2\n\nx"),
            vec![Bytes::from_static(b"line2\n"), Bytes::from_static(b"\n")]
        );
        assert_eq!(cursor.offset(), 14);
        assert_eq!(cursor.take_pending(), Some(Bytes::from_static(b"x")));
        assert_eq!(cursor.take_pending(), None);
    }

    #[test]
    fn test_cursor_reset() {
        let mut cursor = TailCursor::default();
        cursor.feed(b"abc\npartial");
        cursor.reset();
        assert_eq!(cursor.offset(), 0);
        assert!(cursor.pending().is_empty());
    }

    #[test_case(1 ; "one byte")]
    #[test_case(2 ; "two bytes")]
    #[test_case(5 ; "five bytes")]
    #[test_case(7 ; "seven bytes")]
    #[test_case(DEFAULT_CHUNK_SIZE ; "default chunk")]
    #[tokio::test]
    async fn test_round_trip_any_chunk_size(chunk_size: usize) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.txt");
        let content = b"line1\nline2\nlast-no-nl";
        std::fs::write(&path, content).unwrap();

        let registry = Arc::new(QueueRegistry::new());
        let client = QueueClient::local(Arc::clone(&registry), "q");
        let cancel = CancellationToken::new();
        let mut tailer = Tailer::new(&path, client).with_chunk_size(chunk_size);

        assert_eq!(tailer.poll_once(&cancel).await.unwrap(), PollOutcome::Read(22));
        assert_eq!(tailer.poll_once(&cancel).await.unwrap(), PollOutcome::Read(0));
        assert_eq!(tailer.cursor().pending(), b"last-no-nl");
        assert_eq!(registry.len("q"), 2);

        tailer.finish(&cancel).await.unwrap();
        let units = drain_all(&registry, "q");
        assert_eq!(units.len(), 3);
        assert_eq!(units.concat(), content);
    }

    #[tokio::test]
    async fn test_appended_bytes_are_picked_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("growing.log");
        std::fs::write(&path, "first\nsec").unwrap();

        let registry = Arc::new(QueueRegistry::new());
        let cancel = CancellationToken::new();
        let mut tailer = Tailer::new(&path, QueueClient::local(Arc::clone(&registry), "q"));

        tailer.poll_once(&cancel).await.unwrap();
        assert_eq!(drain_all(&registry, "q"), vec![Bytes::from_static(b"first\n")]);

        let mut data = std::fs::read(&path).unwrap();
        data.extend_from_slice(b"ond\nthird\n");
        std::fs::write(&path, data).unwrap();

        assert_eq!(tailer.poll_once(&cancel).await.unwrap(), PollOutcome::Read(10));
        assert_eq!(
            drain_all(&registry, "q"),
            vec![Bytes::from_static(b"second\n"), Bytes::from_static(b"third\n")]
        );
        assert_eq!(tailer.cursor().offset(), 19);
    }

    #[tokio::test]
    async fn test_truncation_resets_cursor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rotating.log");
        std::fs::write(&path, "abc\npartial").unwrap();

        let registry = Arc::new(QueueRegistry::new());
        let cancel = CancellationToken::new();
        let mut tailer = Tailer::new(&path, QueueClient::local(Arc::clone(&registry), "q"));

        tailer.poll_once(&cancel).await.unwrap();
        assert_eq!(tailer.cursor().offset(), 11);

        std::fs::write(&path, "x\n").unwrap();
        tailer.poll_once(&cancel).await.unwrap();

        assert_eq!(tailer.cursor().offset(), 2);
        assert!(tailer.cursor().pending().is_empty());
        assert_eq!(
            drain_all(&registry, "q"),
            vec![Bytes::from_static(b"abc\n"), Bytes::from_static(b"x\n")]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(QueueRegistry::new());
        let mut tailer = Tailer::new(
            dir.path().join("absent"),
            QueueClient::local(registry, "q"),
        );
        let outcome = tailer.poll_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, PollOutcome::Missing);
    }

    #[tokio::test]
    async fn test_streaming_producer_waits_for_file_and_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.log");
        let registry = Arc::new(QueueRegistry::new());
        let client = QueueClient::local(Arc::clone(&registry), "q");
        let cancel = CancellationToken::new();
        let config = TailConfig::builder()
            .poll_interval(Duration::from_millis(5))
            .build();

        let task = tokio::spawn({
            let (path, cancel) = (path.clone(), cancel.clone());
            async move { run_streaming_producer(&path, &client, &config, &cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(&path, "one\ntwo\nthr").unwrap();

        for _ in 0..200 {
            if registry.len("q") == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(registry.len("q"), 2);

        cancel.cancel();
        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(registry.len("q"), 2);
    }
}

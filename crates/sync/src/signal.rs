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

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio_util::sync::CancellationToken;

/// One-shot "the producer has finished enqueueing" latch.
///
/// Separate from cancellation: a producer that stops because it was
/// cancelled must not make the consumer believe the data is complete.
/// Clones observe the same latch. Once signalled it stays signalled.
#[derive(Debug, Clone, Default)]
pub struct ProducerDone {
    flag: Arc<AtomicBool>,
}

impl ProducerDone {
    pub fn new() -> Self { Self::default() }

    pub fn signal(&self) { self.flag.store(true, Ordering::Release); }

    pub fn is_signalled(&self) -> bool { self.flag.load(Ordering::Acquire) }

    /// Returns a guard that signals when dropped, unless disarmed.
    ///
    /// The producer task holds it so a successful return signals even if the
    /// task body forgets to, while [`DoneGuard::disarm`] keeps an error or
    /// cancellation from looking like completion.
    pub fn guard(&self) -> DoneGuard {
        DoneGuard {
            done:  self.clone(),
            armed: true,
        }
    }
}

/// See [`ProducerDone::guard`].
#[derive(Debug)]
pub struct DoneGuard {
    done:  ProducerDone,
    armed: bool,
}

impl DoneGuard {
    pub fn disarm(mut self) { self.armed = false; }
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        if self.armed {
            self.done.signal();
        }
    }
}

/// Sleeps for `duration` unless `cancel` fires first.
///
/// Returns `false` when cancelled.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        () = cancel.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_is_shared_and_sticky() {
        let done = ProducerDone::new();
        let observer = done.clone();
        assert!(!observer.is_signalled());
        done.signal();
        done.signal();
        assert!(observer.is_signalled());
    }

    #[test]
    fn test_guard_signals_on_drop() {
        let done = ProducerDone::new();
        drop(done.guard());
        assert!(done.is_signalled());
    }

    #[test]
    fn test_disarmed_guard_does_not_signal() {
        let done = ProducerDone::new();
        done.guard().disarm();
        assert!(!done.is_signalled());
    }

    #[tokio::test]
    async fn test_sleep_or_cancel() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(Duration::from_millis(1), &cancel).await);
        cancel.cancel();
        assert!(!sleep_or_cancel(Duration::from_secs(60), &cancel).await);
    }
}

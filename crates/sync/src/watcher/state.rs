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

//! Per-file stability bookkeeping.
//!
//! ```text
//! Unseen ──first scan──▶ Tracking ──size stable for N scans──▶ Processing ──▶ Done
//!                          ▲  │ size changed: stable_scans = 0        │
//!                          │  └───────────┘                           │
//!                          └───────── failed, attempts left ──────────┘
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Unseen,
    Tracking,
    Processing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FileWatchState {
    pub last_observed_size: u64,
    pub stable_scans:       u32,
    pub phase:              Phase,
    /// Pipelines launched for this file so far.
    pub attempts:           u32,
}

/// What one scan decided for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting; never processed on this scan.
    Discovered,
    /// Already processing or done.
    Skipped,
    /// Size differs from the previous scan.
    Changed,
    /// Same size, not yet stable long enough.
    Stable,
    /// Stable long enough: the caller must launch exactly one pipeline.
    Launch,
}

/// All known files and their phases, behind one lock.
///
/// Entries are never removed, so a `Done` file stays done even if it is
/// rewritten.
#[derive(Debug)]
pub struct WatchTable {
    files:        Mutex<HashMap<PathBuf, FileWatchState>>,
    threshold:    u32,
    max_attempts: u32,
}

impl WatchTable {
    /// `threshold` and `max_attempts` are clamped to at least 1.
    pub fn new(threshold: u32, max_attempts: u32) -> Self {
        Self {
            files:        Mutex::new(HashMap::new()),
            threshold:    threshold.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn observe(&self, path: &Path, size: u64) -> Observation {
        let mut files = self.files.lock();
        let Some(state) = files.get_mut(path) else {
            files.insert(
                path.to_path_buf(),
                FileWatchState {
                    last_observed_size: size,
                    phase: Phase::Tracking,
                    ..FileWatchState::default()
                },
            );
            return Observation::Discovered;
        };

        match state.phase {
            Phase::Processing | Phase::Done => Observation::Skipped,
            Phase::Unseen | Phase::Tracking => {
                state.phase = Phase::Tracking;
                if size != state.last_observed_size {
                    state.last_observed_size = size;
                    state.stable_scans = 0;
                    return Observation::Changed;
                }
                state.stable_scans = state.stable_scans.saturating_add(1);
                if state.stable_scans < self.threshold {
                    return Observation::Stable;
                }
                state.phase = Phase::Processing;
                state.attempts += 1;
                Observation::Launch
            }
        }
    }

    /// Records the end of a pipeline and returns the file's new phase.
    ///
    /// Success always ends in `Done`. A failure goes back to `Tracking`
    /// while attempts remain, otherwise it is `Done` too.
    pub fn complete(&self, path: &Path, succeeded: bool) -> Phase {
        let mut files = self.files.lock();
        let Some(state) = files.get_mut(path) else {
            return Phase::Unseen;
        };
        debug_assert_eq!(state.phase, Phase::Processing);
        if succeeded || state.attempts >= self.max_attempts {
            state.phase = Phase::Done;
        } else {
            state.phase = Phase::Tracking;
            state.stable_scans = 0;
        }
        state.phase
    }

    pub fn phase(&self, path: &Path) -> Phase {
        self.files
            .lock()
            .get(path)
            .map_or(Phase::Unseen, |state| state.phase)
    }

    pub fn state(&self, path: &Path) -> Option<FileWatchState> { self.files.lock().get(path).copied() }

    /// Copy of every entry, sorted by path.
    pub fn snapshot(&self) -> Vec<(PathBuf, FileWatchState)> {
        let mut entries: Vec<_> = self
            .files
            .lock()
            .iter()
            .map(|(path, state)| (path.clone(), *state))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize { self.files.lock().len() }

    pub fn is_empty(&self) -> bool { self.files.lock().is_empty() }
}

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

use std::sync::LazyLock;

use prometheus::{IntCounter, register_int_counter};

pub static FILES_DISCOVERED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "sync_files_discovered_total",
        "Total number of files first seen by the directory watcher"
    )
    .unwrap()
});

pub static PIPELINES_LAUNCHED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "sync_pipelines_launched_total",
        "Total number of producer/drain pipelines launched"
    )
    .unwrap()
});

pub static PIPELINES_SUCCEEDED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "sync_pipelines_succeeded_total",
        "Total number of pipelines that drained their file completely"
    )
    .unwrap()
});

pub static PIPELINES_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "sync_pipelines_failed_total",
        "Total number of pipelines that ended with an error or panic"
    )
    .unwrap()
});

pub static TAILER_TRUNCATIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "sync_tailer_truncations_total",
        "Total number of times a tailed file shrank below the read offset"
    )
    .unwrap()
});

pub static LINES_ENQUEUED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "sync_lines_enqueued_total",
        "Total number of lines handed to the queue by producers"
    )
    .unwrap()
});

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

use prometheus::{
    IntCounterVec, IntGauge, IntGaugeVec, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec,
};

pub const QUEUE_LABEL: &str = "queue";

pub static QUEUE_ENQUEUED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "queue_enqueued_total",
        "Total number of messages enqueued",
        &[QUEUE_LABEL]
    )
    .unwrap()
});

pub static QUEUE_DEQUEUED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "queue_dequeued_total",
        "Total number of messages dequeued",
        &[QUEUE_LABEL]
    )
    .unwrap()
});

pub static QUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "queue_depth",
        "Number of messages currently held by the queue",
        &[QUEUE_LABEL]
    )
    .unwrap()
});

pub static QUEUES_CREATED: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("queue_registry_queues", "Number of named queues in the registry")
        .unwrap()
});

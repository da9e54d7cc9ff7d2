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

//! Benchmarks for the in-memory queue.
//!
//! Measures:
//! - Enqueue throughput at different message sizes
//! - Enqueue/dequeue round trips through the registry

use std::hint::black_box;

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lineq_common_storage_queue::{Queue, QueueRegistry};

/// Message sizes to benchmark (bytes)
const MESSAGE_SIZES: &[usize] = &[64, 256, 1024, 4096, 16384];

/// Number of messages per iteration for throughput tests
const BATCH_SIZE: usize = 10_000;

fn generate_message(size: usize) -> Bytes { Bytes::from(vec![0xABu8; size]) }

fn bench_enqueue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_throughput");

    for &size in MESSAGE_SIZES {
        group.throughput(Throughput::Bytes((size * BATCH_SIZE) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let msg = generate_message(size);
            b.iter(|| {
                let queue = Queue::new("bench");
                for _ in 0..BATCH_SIZE {
                    queue.enqueue(black_box(&msg));
                }
                black_box(queue.len())
            });
        });
    }

    group.finish();
}

fn bench_registry_round_trip(c: &mut Criterion) {
    let registry = QueueRegistry::new();
    let msg = generate_message(256);

    c.bench_function("registry_round_trip", |b| {
        b.iter(|| {
            registry.enqueue("bench", black_box(&msg));
            black_box(registry.dequeue("bench"))
        });
    });
}

criterion_group!(benches, bench_enqueue_throughput, bench_registry_round_trip);
criterion_main!(benches);

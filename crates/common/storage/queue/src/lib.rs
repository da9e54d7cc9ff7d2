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

//! In-memory FIFO queues of byte messages, addressed by name.
//!
//! A [`Queue`] is an ordered list of immutable [`Bytes`](bytes::Bytes)
//! messages guarded by its own lock. The [`QueueRegistry`] hands out queues by
//! name, creating them on first reference and never removing them.
//!
//! ```
//! use lineq_common_storage_queue::QueueRegistry;
//!
//! let registry = QueueRegistry::new();
//! registry.enqueue("lines", b"hello\n");
//! assert_eq!(registry.len("lines"), 1);
//! assert_eq!(registry.dequeue("lines").as_deref(), Some(&b"hello\n"[..]));
//! assert!(registry.dequeue("lines").is_none());
//! ```

mod metrics;
pub mod queue;
pub mod registry;

pub use queue::{Queue, QueueStats};
pub use registry::QueueRegistry;

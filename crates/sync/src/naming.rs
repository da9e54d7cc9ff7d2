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

//! Mapping from a discovered file to the queue that carries it.

/// Used when sanitizing leaves nothing behind.
pub const FALLBACK_QUEUE_NAME: &str = "file";

/// Keeps ASCII letters, digits, `.`, `-` and `_`; every other character
/// becomes one `_`.
pub fn sanitize_queue_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        FALLBACK_QUEUE_NAME.to_string()
    } else {
        sanitized
    }
}

/// Picks the queue name for a file from its base name.
pub trait QueueNameBuilder: Send + Sync + 'static {
    fn queue_name(&self, file_name: &str) -> String;
}

impl<F> QueueNameBuilder for F
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    fn queue_name(&self, file_name: &str) -> String { self(file_name) }
}

/// `"{base}-{sanitized file name}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixedQueueName {
    base: String,
}

impl PrefixedQueueName {
    pub fn new(base: impl Into<String>) -> Self { Self { base: base.into() } }
}

impl QueueNameBuilder for PrefixedQueueName {
    fn queue_name(&self, file_name: &str) -> String {
        format!("{}-{}", self.base, sanitize_queue_name(file_name))
    }
}

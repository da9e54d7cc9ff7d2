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

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

pub const DEFAULT_QUEUE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the queue service lives and how long to wait for it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the queue service, without the `/queues` suffix.
    #[default(_code = "DEFAULT_QUEUE_URL.to_string()")]
    #[builder(into, default = DEFAULT_QUEUE_URL.to_string())]
    pub queue_url:       String,
    /// Per-request timeout.
    #[default(_code = "DEFAULT_REQUEST_TIMEOUT")]
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.queue_url, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(ClientConfig::builder().build(), config);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::builder()
            .queue_url("http://queue:9000")
            .request_timeout(Duration::from_millis(250))
            .build();
        assert_eq!(config.queue_url, "http://queue:9000");
        assert_eq!(config.request_timeout, Duration::from_millis(250));
    }
}

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

pub mod error;
pub mod http;
pub mod queue;

use std::net::SocketAddr;

use snafu::Snafu;
use tokio::{sync::oneshot::Receiver, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(transparent)]
    Network { source: NetworkError },

    #[snafu(display("Server task on {addr} did not finish cleanly"))]
    ServerTask {
        addr:   SocketAddr,
        source: tokio::task::JoinError,
    },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum NetworkError {
    #[snafu(display("Failed to bind {addr}"))]
    ConnectionError {
        addr:   String,
        #[snafu(source)]
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse address {addr}"))]
    ParseAddressError {
        addr:   String,
        #[snafu(source)]
        source: std::net::AddrParseError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Handle for managing a running service.
///
/// This handle provides control over a running service, allowing you to:
/// - Wait for the service to start accepting connections
/// - Signal graceful shutdown
/// - Wait for the service to fully stop
/// - Check if the service task has completed
pub struct ServiceHandler {
    /// Join handle for the server task
    join_handle:        JoinHandle<()>,
    /// Token for signalling shutdown
    cancellation_token: CancellationToken,
    /// Receiver for server start notification
    started_rx:         Option<Receiver<()>>,
    /// Address the listener is bound to, with the real port when 0 was asked
    local_addr:         SocketAddr,
}

impl ServiceHandler {
    /// Waits for the server to start accepting connections.
    ///
    /// # Panics
    /// Panics if called more than once, as the start signal is consumed.
    pub async fn wait_for_start(&mut self) -> Result<()> {
        self.started_rx
            .take()
            .expect("Server start signal already consumed")
            .await
            .expect("Failed to receive server start signal");
        Ok(())
    }

    /// Waits for the server to completely stop.
    ///
    /// Use this after calling `shutdown()` to ensure clean termination.
    ///
    /// A panicked or aborted server task is logged and returned as
    /// [`Error::ServerTask`].
    pub async fn wait_for_stop(self) -> Result<()> {
        let addr = self.local_addr;
        self.join_handle.await.map_err(|source| {
            error!(%addr, error = %source, "REST server task failed");
            Error::ServerTask { addr, source }
        })
    }

    /// Signals the server to begin graceful shutdown.
    ///
    /// This method triggers the shutdown process but does not wait for
    /// completion. Use `wait_for_stop()` to wait for the server to fully stop.
    pub fn shutdown(&self) { self.cancellation_token.cancel(); }

    /// Checks if the server task has completed.
    pub fn is_finished(&self) -> bool { self.join_handle.is_finished() }

    pub const fn local_addr(&self) -> SocketAddr { self.local_addr }
}

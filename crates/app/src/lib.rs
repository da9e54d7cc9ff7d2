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

pub mod worker;

use std::{
    net::SocketAddr,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use axum::Router;
use bon::Builder;
use lineq_client::ClientConfig;
use lineq_common_storage_queue::QueueRegistry;
use lineq_common_telemetry::LoggingOptions;
use lineq_server::{
    http::{RestServerConfig, health_routes, start_rest_server},
    queue::queue_routes,
};
use lineq_sync::WatchConfig;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, Whatever};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Represents the queue service with lifecycle management
#[derive(SmartDefault)]
pub struct App {
    /// Application configuration
    pub config:             AppConfig,
    /// Queues served over HTTP
    #[default(_code = "Arc::new(QueueRegistry::new())")]
    pub registry:           Arc<QueueRegistry>,
    /// Controls if the application should continue running
    #[default(_code = "Arc::new(AtomicBool::new(false))")]
    pub running:            Arc<AtomicBool>,
    /// Cancellation token for graceful shutdown
    #[default(_code = "CancellationToken::new()")]
    pub cancellation_token: CancellationToken,
}

/// Configuration for every lineq command, loadable from TOML.
///
/// ```toml
/// [http]
/// bind_address = "0.0.0.0:8080"
///
/// [client]
/// queue_url = "http://queue:8080"
/// request_timeout = "10s"
///
/// [watch]
/// dir = "/srv/in"
/// poll_interval = "1s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct AppConfig {
    /// Queue service configuration
    #[builder(default)]
    pub http:                     RestServerConfig,
    #[builder(default)]
    pub logging:                  LoggingOptions,
    /// How workers reach the queue service
    #[builder(default)]
    pub client:                   ClientConfig,
    #[builder(default)]
    pub watch:                    WatchConfig,
    /// Whether Ctrl-C / SIGTERM stop the service
    #[default = true]
    #[builder(default = true)]
    pub enable_graceful_shutdown: bool,
}

impl AppConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Whatever> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_whatever_context(|_| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text)
            .with_whatever_context(|_| format!("Failed to parse config {}", path.display()))
    }

    #[must_use]
    pub fn open(self) -> App {
        App {
            config: self,
            ..Default::default()
        }
    }
}

/// Handle for controlling a running application
pub struct AppHandle {
    /// Sender for triggering shutdown
    shutdown_tx:        Option<oneshot::Sender<()>>,
    /// Application running flag
    running:            Arc<AtomicBool>,
    /// Cancelled once the server has stopped
    cancellation_token: CancellationToken,
    /// Address the queue service listens on
    http_addr:          SocketAddr,
}

impl AppHandle {
    /// Gracefully shutdown the application
    pub fn shutdown(&mut self) {
        info!("Initiating graceful shutdown");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Check if the application is still running
    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    #[must_use]
    pub const fn http_addr(&self) -> SocketAddr { self.http_addr }

    /// Wait for the application to shutdown
    pub async fn wait_for_shutdown(&self) { self.cancellation_token.cancelled().await; }
}

type RouteHandler = Box<dyn Fn(Router) -> Router + Send + Sync>;

impl App {
    /// Start the queue service and return a handle for controlling it
    pub async fn start(&self) -> Result<AppHandle, Whatever> {
        info!("Starting lineq queue service");

        let handlers: Vec<RouteHandler> = vec![
            Box::new(health_routes),
            Box::new(queue_routes(Arc::clone(&self.registry))),
        ];
        let mut http_handle = start_rest_server(self.config.http.clone(), handlers)
            .await
            .whatever_context("Failed to start REST server")?;
        http_handle
            .wait_for_start()
            .await
            .whatever_context("REST server did not start")?;
        let http_addr = http_handle.local_addr();
        info!(%http_addr, "Queue service started");

        self.running.store(true, Ordering::SeqCst);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app_handle = AppHandle {
            shutdown_tx: Some(shutdown_tx),
            running: Arc::clone(&self.running),
            cancellation_token: self.cancellation_token.clone(),
            http_addr,
        };

        let running = Arc::clone(&self.running);
        let cancellation_token = self.cancellation_token.clone();
        let enable_graceful_shutdown = self.config.enable_graceful_shutdown;
        tokio::spawn(async move {
            if enable_graceful_shutdown {
                tokio::select! {
                    () = shutdown_signal() => {}
                    _ = shutdown_rx => info!("Received shutdown request"),
                }
            } else {
                // Just wait for explicit shutdown if graceful shutdown is disabled
                let _ = shutdown_rx.await;
            }

            running.store(false, Ordering::SeqCst);
            info!("Shutting down queue service");
            http_handle.shutdown();
            // Logged by `wait_for_stop`.
            let _ = http_handle.wait_for_stop().await;
            cancellation_token.cancel();
            info!("Application shutdown complete");
        });

        Ok(app_handle)
    }

    /// Run the application blocking until it's shut down
    pub async fn run(self) -> Result<(), Whatever> {
        let handle = self.start().await?;
        handle.wait_for_shutdown().await;
        Ok(())
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
///
/// # Panics
///
/// If the signal handlers cannot be installed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
    }
}

/// Cancels `token` when a shutdown signal arrives.
pub fn cancel_on_shutdown_signal(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown_signal() => token.cancel(),
            () = token.cancelled() => {}
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lineq_client::QueueClient;

    use super::*;

    fn local_config() -> AppConfig {
        AppConfig::builder()
            .http(RestServerConfig::builder().bind_address("127.0.0.1:0").build())
            .enable_graceful_shutdown(false)
            .build()
    }

    #[tokio::test]
    async fn test_app_creation() {
        let app = AppConfig::default().open();
        assert!(!app.running.load(Ordering::SeqCst));
        assert!(app.registry.names().is_empty());
    }

    #[tokio::test]
    async fn test_app_serves_queues_until_shutdown() {
        let app = local_config().open();
        let registry = Arc::clone(&app.registry);
        let mut handle = app.start().await.unwrap();
        assert!(handle.is_running());

        let client_config = ClientConfig::builder()
            .queue_url(format!("http://{}", handle.http_addr()))
            .build();
        let client = QueueClient::http(&client_config, "lines").unwrap();
        client.enqueue("hello\n").await.unwrap();
        assert_eq!(registry.len("lines"), 1);

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle.wait_for_shutdown())
            .await
            .unwrap();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_config_from_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lineq.toml");
        std::fs::write(
            &path,
            r#"
enable_graceful_shutdown = false

[http]
bind_address = "0.0.0.0:9090"

[client]
request_timeout = "5s"

[watch]
dir = "/srv/in"
poll_interval = "1s"
base_queue_name = "ingest"

[watch.failure_policy]
max_attempts = 3
dead_letter_dir = "/srv/dead"
"#,
        )
        .unwrap();

        let config = AppConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.http.bind_address, "0.0.0.0:9090");
        assert!(config.http.enable_cors);
        assert_eq!(config.client.request_timeout, Duration::from_secs(5));
        assert_eq!(config.client.queue_url, "http://localhost:8080");
        assert_eq!(config.watch.poll_interval, Duration::from_secs(1));
        assert_eq!(config.watch.base_queue_name, "ingest");
        assert_eq!(config.watch.failure_policy.max_attempts, 3);
        assert_eq!(config.watch.stability_threshold, 1);
        assert!(!config.enable_graceful_shutdown);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        assert!(AppConfig::from_toml_file("/definitely/not/here.toml").is_err());
    }
}

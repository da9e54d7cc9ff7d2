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

use axum::{
    Router, extract::DefaultBodyLimit, http::StatusCode, response::IntoResponse, routing::get,
};
use prometheus::TextEncoder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use super::ServiceHandler;
use crate::{
    ConnectionSnafu, ParseAddressSnafu, Result,
    error::{ApiResult, EncodeMetricsSnafu},
};

/// Default bind address of the queue service.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Default maximum HTTP request body size (100 MiB)
pub const DEFAULT_MAX_HTTP_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Configuration options for a REST server
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct RestServerConfig {
    /// The address to bind the REST server
    #[default(_code = "DEFAULT_BIND_ADDRESS.to_string()")]
    #[builder(into, default = DEFAULT_BIND_ADDRESS.to_string())]
    pub bind_address:  String,
    /// Maximum HTTP request body size in bytes; larger messages get `413`
    #[default(_code = "DEFAULT_MAX_HTTP_BODY_SIZE")]
    #[builder(default = DEFAULT_MAX_HTTP_BODY_SIZE)]
    pub max_body_size: usize,
    /// Whether to enable CORS
    #[default = true]
    #[builder(default = true)]
    pub enable_cors:   bool,
}

/// Starts the REST server and returns a handle for managing its lifecycle.
///
/// The address is bound before this returns, so a taken port is reported
/// here rather than inside the server task. Binding port 0 picks a free
/// port; read it back with [`ServiceHandler::local_addr`].
///
/// # Example
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use lineq_server::http::{RestServerConfig, start_rest_server};
///
/// fn my_routes(router: Router) -> Router {
///     router.route("/api/v1/hello", get(|| async { "Hello, World!" }))
/// }
///
/// # async fn run() -> lineq_server::Result<()> {
/// let config = RestServerConfig::default();
/// let handlers = vec![my_routes];
/// let mut handle = start_rest_server(config, handlers).await?;
/// handle.wait_for_start().await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_rest_server<F>(
    config: RestServerConfig,
    route_handlers: Vec<F>,
) -> Result<ServiceHandler>
where
    F: Fn(Router) -> Router + Send + Sync + 'static,
{
    let bind_addr = config
        .bind_address
        .parse::<std::net::SocketAddr>()
        .context(ParseAddressSnafu {
            addr: config.bind_address.clone(),
        })?;

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler));

    // Register route handlers before layering so every route gets the layers
    for handler in &route_handlers {
        info!("Registering REST route handler");
        router = handler(router);
    }

    router = router
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_body_size));

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context(ConnectionSnafu {
            addr: config.bind_address.clone(),
        })?;
    let local_addr = listener.local_addr().context(ConnectionSnafu {
        addr: config.bind_address.clone(),
    })?;

    let cancellation_token = CancellationToken::new();
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let shutdown = cancellation_token.clone();
    let join_handle = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                info!("REST server (on {}) started", local_addr);
                let _ = started_tx.send(());
                shutdown.cancelled().await;
                info!("REST server (on {}) received shutdown signal", local_addr);
            })
            .await;

        match result {
            Ok(()) => info!("REST server (on {}) task completed", local_addr),
            Err(e) => error!("REST server (on {}) stopped with error: {}", local_addr, e),
        }
    });

    Ok(ServiceHandler {
        join_handle,
        cancellation_token,
        started_rx: Some(started_rx),
        local_addr,
    })
}

/// Health check endpoint for the REST server
async fn health_check() -> impl IntoResponse { (StatusCode::OK, "OK") }

/// Prometheus text exposition of every registered metric.
async fn metrics_handler() -> ApiResult<String> {
    TextEncoder::new()
        .encode_to_string(&prometheus::gather())
        .context(EncodeMetricsSnafu)
}

/// Health check handler that returns detailed health information
async fn api_health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "lineq",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Add health routes to the router
pub fn health_routes(router: Router) -> Router {
    router
        .route("/api/v1/health", get(api_health_handler))
        .route("/api/health", get(api_health_handler))
}

#[cfg(test)]
mod tests {
    use axum::{Json, routing::get};

    use super::*;

    fn local_config() -> RestServerConfig {
        RestServerConfig::builder().bind_address("127.0.0.1:0").build()
    }

    #[test]
    fn test_default_config() {
        let config = RestServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.max_body_size, 100 * 1024 * 1024);
        assert!(config.enable_cors);
        assert_eq!(RestServerConfig::builder().build(), config);
    }

    #[tokio::test]
    async fn test_rest_server_lifecycle() {
        lineq_common_telemetry::init_default_ut_logging();

        let handlers: Vec<fn(Router) -> Router> = vec![health_routes];
        let mut handler = start_rest_server(local_config(), handlers).await.unwrap();
        handler.wait_for_start().await.unwrap();
        let base = format!("http://{}", handler.local_addr());

        let client = reqwest::Client::new();
        let response = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(response.status(), 200);

        let response = client
            .get(format!("{base}/api/v1/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["service"], "lineq");

        let response = client.get(format!("{base}/metrics")).send().await.unwrap();
        assert_eq!(response.status(), 200);

        handler.shutdown();
        handler.wait_for_stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_rest_server_without_cors() {
        let config = RestServerConfig {
            enable_cors: false,
            ..local_config()
        };
        let mut handler = start_rest_server(config, vec![health_routes]).await.unwrap();
        handler.wait_for_start().await.unwrap();

        let response = reqwest::get(format!("http://{}/health", handler.local_addr()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        handler.shutdown();
        handler.wait_for_stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_multiple_route_handlers() {
        async fn goodbye_handler() -> Json<&'static str> { Json("Goodbye, World!") }

        fn goodbye_routes(router: Router) -> Router {
            router.route("/api/v1/goodbye", get(goodbye_handler))
        }

        let handlers = vec![health_routes, goodbye_routes];
        let mut handler = start_rest_server(local_config(), handlers).await.unwrap();
        handler.wait_for_start().await.unwrap();
        let base = format!("http://{}", handler.local_addr());

        let client = reqwest::Client::new();
        for path in ["/api/v1/health", "/api/v1/goodbye"] {
            let response = client.get(format!("{base}{path}")).send().await.unwrap();
            assert_eq!(response.status(), 200);
        }

        handler.shutdown();
        handler.wait_for_stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = RestServerConfig::builder()
            .bind_address(taken.local_addr().unwrap().to_string())
            .build();
        let handlers: Vec<fn(Router) -> Router> = vec![];
        assert!(start_rest_server(config, handlers).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_address_is_reported() {
        let config = RestServerConfig::builder().bind_address("not an address").build();
        let handlers: Vec<fn(Router) -> Router> = vec![];
        assert!(start_rest_server(config, handlers).await.is_err());
    }
}

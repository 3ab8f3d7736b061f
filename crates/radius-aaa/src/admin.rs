//! Admin HTTP surface: health probes and Prometheus metrics

use crate::metrics::MetricsAggregator;
use crate::state::CacheStore;
use crate::store::NasStore;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Header carrying the admin API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" when every dependency is up
    pub status: String,
    pub cache: DependencyHealth,
    pub database: DependencyHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    /// "up" or "down"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyHealth {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                status: "up".to_string(),
                error: None,
            },
            Err(e) => Self {
                status: "down".to_string(),
                error: Some(e.to_string()),
            },
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

#[derive(Clone)]
pub struct AdminState {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn NasStore>,
    metrics: Arc<MetricsAggregator>,
    api_key: Arc<str>,
}

impl AdminState {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn NasStore>,
        metrics: Arc<MetricsAggregator>,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            cache,
            store,
            metrics,
            api_key: api_key.into(),
        }
    }

    async fn get_health(&self) -> HealthStatus {
        let cache = DependencyHealth::from_result(self.cache.ping().await);
        let database = DependencyHealth::from_result(self.store.ping().await);

        let status = if cache.is_up() && database.is_up() {
            "healthy"
        } else {
            "unhealthy"
        };

        HealthStatus {
            status: status.to_string(),
            cache,
            database,
        }
    }
}

async fn health_handler(State(state): State<AdminState>) -> Response {
    let health = state.get_health().await;

    let status_code = if health.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health)).into_response()
}

/// Liveness just checks that the process answers
async fn live_handler() -> Response {
    (StatusCode::OK, "alive").into_response()
}

async fn metrics_handler(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| key == &*state.api_key);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"status": "error", "message": "Unauthorized"})),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
        .into_response()
}

pub fn create_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(live_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin router. It never returns `Ok`: the admin surface
/// stopping is fatal, like a RADIUS listener stopping.
pub async fn start_admin_server(state: AdminState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Admin HTTP server on {}", listener.local_addr()?);
    serve_until(listener, create_admin_router(state), std::future::pending()).await
}

async fn serve_until<S>(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: S,
) -> std::io::Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Err(std::io::Error::other("admin server stopped"))
}

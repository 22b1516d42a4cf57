//! `CarelinkServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use carelink_auth::IdentityResolver;
use carelink_core::Role;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::registry::SessionRegistry;
use crate::router::MessageRouter;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionContext, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// What every WebSocket session shares.
    pub session: Arc<SessionContext>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// One permit per open WebSocket connection.
    pub permits: Arc<Semaphore>,
    /// Size of the permit pool.
    pub max_connections: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The carelink pairing server.
pub struct CarelinkServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    session: Arc<SessionContext>,
    shutdown: Arc<ShutdownCoordinator>,
    permits: Arc<Semaphore>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl CarelinkServer {
    /// Create a new server that verifies credentials with `resolver`.
    pub fn new(config: ServerConfig, resolver: Arc<dyn IdentityResolver>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let session = Arc::new(SessionContext {
            router: MessageRouter::new(registry.clone()),
            resolver,
            policy: config.access_policy(),
            send_queue_capacity: config.send_queue_capacity(),
            heartbeat: config.heartbeat(),
            shutdown: shutdown.token(),
        });
        Self {
            permits: Arc::new(Semaphore::new(config.max_connections)),
            config,
            registry,
            session,
            shutdown,
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            session: self.session.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            permits: self.permits.clone(),
            max_connections: self.config.max_connections,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws/patient", get(patient_ws_handler))
            .route("/ws/psychologist", get(psychologist_ws_handler))
            .layer(cors_layer(&self.config.cors_origins))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });

        info!(addr = %local_addr, "carelink server listening");
        Ok((local_addr, handle))
    }

    /// Stop accepting connections and wait for open sessions to finish.
    ///
    /// Returns `true` if every session ended within the shutdown timeout.
    pub async fn stop(&self) -> bool {
        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        self.shutdown.graceful_shutdown(Some(timeout)).await
    }

    /// Open WebSocket connections, authenticated or not.
    pub fn connection_count(&self) -> usize {
        self.config
            .max_connections
            .saturating_sub(self.permits.available_permits())
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// GET /
async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "carelink pairing server" }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state
        .max_connections
        .saturating_sub(state.permits.available_permits());
    let snapshot = state.session.router.registry().snapshot();
    Json(health::health_check(state.start_time, connections, snapshot))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Query parameters accepted by the WebSocket endpoints.
#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// GET /ws/patient
async fn patient_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, Role::Seeker, params.token, &state)
}

/// GET /ws/psychologist
async fn psychologist_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, Role::Responder, params.token, &state)
}

fn upgrade(ws: WebSocketUpgrade, role: Role, token: Option<String>, state: &AppState) -> Response {
    let Ok(permit) = state.permits.clone().try_acquire_owned() else {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(%role, max = state.max_connections, "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let session = state.session.clone();
    let tracker = state.shutdown.sessions().clone();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            tracker.track_future(async move {
                run_ws_session(socket, role, token, session).await;
                drop(permit);
            })
        })
}

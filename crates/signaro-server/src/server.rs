//! `RelayServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use signaro_core::{
    AllowAll, ConnectParams, ConnectPolicy, MessageRouter, SessionRegistry, TokenVerifier,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::session::{reject_ws_session, run_ws_session};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Routes payloads between registered peers.
    pub router: Arc<MessageRouter>,
    /// Connect-time classification rules.
    pub policy: Arc<ConnectPolicy>,
    /// Token check run before classification.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Transport settings.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

/// The signaling relay server.
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a server over an existing registry.
    ///
    /// Token verification defaults to [`AllowAll`] and metrics to off.
    pub fn new(config: ServerConfig, registry: Arc<SessionRegistry>, policy: ConnectPolicy) -> Self {
        let router =
            MessageRouter::new(registry).with_default_client(policy.default_client.clone());
        Self {
            state: AppState {
                router: Arc::new(router),
                policy: Arc::new(policy),
                verifier: Arc::new(AllowAll),
                config: Arc::new(config),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics: None,
            },
        }
    }

    /// Replace the token verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.state.verifier = verifier;
        self
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.state.config.path, get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the listener and serve until shutdown.
    ///
    /// Returns the bound address and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.state.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let token = self.state.shutdown.token();
        info!(%local_addr, path = %self.state.config.path, "signaling relay listening");

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                token.cancelled().await;
            });
            if let Err(e) = serve.await {
                warn!(error = %e, "server terminated with error");
            }
        });

        Ok((local_addr, handle))
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.state.router.registry()
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// GET {path}: classify, then upgrade.
///
/// Rejected connections are still upgraded so the peer receives a close
/// frame with a distinguishable code and reason. Both kinds of session are
/// tracked by the shutdown coordinator.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let ws = ws.max_message_size(state.config.max_message_size);
    match state.policy.admit(&params, state.verifier.as_ref()) {
        Ok(role) => {
            let router = state.router.clone();
            let config = state.config.clone();
            let shutdown = state.shutdown.clone();
            ws.on_upgrade(move |socket| {
                let token = shutdown.token();
                shutdown.track_session(run_ws_session(socket, role, router, config, token))
            })
        }
        Err(rejection) => {
            warn!(reason = rejection.label(), "rejecting connection: {rejection}");
            counter!(WS_CONNECTIONS_REJECTED_TOTAL, "reason" => rejection.label()).increment(1);
            let shutdown = state.shutdown.clone();
            ws.on_upgrade(move |socket| shutdown.track_session(reject_ws_session(socket, rejection)))
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.router.registry(),
        state.shutdown.session_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

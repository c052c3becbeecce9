//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the breaker routes
//! - Wire up middleware (request ID, tracing, timeout, API key)
//! - Apply configuration updates while serving
//! - Stop gracefully on the shutdown broadcast

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::AdmissionDecider;
use crate::config::ServiceConfig;
use crate::http::{handlers, middleware::require_api_key};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub decider: Arc<AdmissionDecider>,
    pub config: Arc<ArcSwap<ServiceConfig>>,
}

/// HTTP front end for an [`AdmissionDecider`].
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let request_timeout = Duration::from_secs(state.config.load().server.request_timeout_secs);
        let router = Self::build_router(state.clone(), request_timeout);
        Self { router, state }
    }

    /// The configured router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let breakers = Router::new()
            .route(
                "/breakers/{key}/is-execution-permitted",
                get(handlers::is_execution_permitted).post(handlers::is_execution_permitted),
            )
            .route(
                "/breakers/{key}/record-success",
                get(handlers::record_success).post(handlers::record_success),
            )
            .route(
                "/breakers/{key}/record-failure",
                get(handlers::record_failure).post(handlers::record_failure),
            )
            .route("/breakers/{key}/circuit-state", get(handlers::circuit_state))
            .route("/breakers/{key}/breaker-state", get(handlers::breaker_state))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

        Router::new()
            .merge(breakers)
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// Serve until the shutdown broadcast fires.
    ///
    /// Configuration updates are swapped in as they arrive and clear the
    /// decider's cached settings.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let updates = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                state.config.store(Arc::new(new_config));
                state.decider.reload();
                tracing::info!("Configuration updated");
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        updates.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the context endpoints
//! - Wire up middleware (tracing, timeout, correlation)
//! - Bind server to listener
//! - Relay to the downstream service with propagated context

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::context::{self, Propagator};
use crate::error::ServerError;
use crate::http::headers::ContextHeaders;
use crate::http::middleware::CorrelationLayer;
use crate::http::outbound::PropagateContext;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub downstream: Option<String>,
    pub headers: ContextHeaders,
}

/// What one unit observes of its request context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextView {
    pub request_id: Option<String>,
    pub hop: Option<u32>,
    pub session: Option<String>,
    pub session_group: Option<String>,
    pub data: Map<String, Value>,
}

impl ContextView {
    /// Snapshot the record of the unit executing now.
    pub fn current() -> Self {
        match context::current_record() {
            Some(record) => Self {
                request_id: Some(record.correlation_id().to_string()),
                hop: Some(record.hop()),
                session: record.session().map(str::to_string),
                session_group: record.session_group().map(str::to_string),
                data: record.data(),
            },
            None => Self {
                request_id: None,
                hop: None,
                session: None,
                session_group: None,
                data: Map::new(),
            },
        }
    }
}

/// Response of `GET /context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    pub handler: ContextView,
    pub child: ContextView,
}

/// Response of `GET /relay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayReport {
    pub local: ContextView,
    pub downstream: ContextReport,
}

/// HTTP server exposing the context endpoints.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        let correlation = CorrelationLayer::try_new(&config.context)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.downstream.timeout_secs))
            .no_proxy()
            .build()?;

        let state = AppState {
            client,
            downstream: config.downstream.url.clone(),
            headers: correlation.headers().clone(),
        };

        let router = Self::build_router(&config, state, correlation);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ServiceConfig,
        state: AppState,
        correlation: CorrelationLayer,
    ) -> Router {
        Router::new()
            .route("/context", get(context_handler))
            .route("/relay", get(relay_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(correlation)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` resolves, then drain.
    pub async fn run_until<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Reports the context seen by the handler and by a task it spawns.
async fn context_handler() -> Result<Json<ContextReport>, (StatusCode, String)> {
    context::set_data("handled", true);
    let handler = ContextView::current();

    let child = context::spawn(async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        ContextView::current()
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Child task failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Child task failed".to_string())
    })?;

    tracing::debug!(request_id = ?handler.request_id, "Context reported");
    Ok(Json(ContextReport { handler, child }))
}

/// Calls the downstream `/context` with propagated headers.
async fn relay_handler(
    State(state): State<AppState>,
) -> Result<Json<RelayReport>, (StatusCode, String)> {
    let Some(base) = state.downstream.as_deref() else {
        return Err((StatusCode::NOT_FOUND, "No downstream configured".to_string()));
    };

    let local = ContextView::current();
    let url = format!("{}/context", base.trim_end_matches('/'));

    let response = state
        .client
        .get(&url)
        .propagate_context_with(&state.headers)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(url = %url, error = %e, "Downstream error");
            (StatusCode::BAD_GATEWAY, "Downstream request failed".to_string())
        })?;

    let downstream = response.json::<ContextReport>().await.map_err(|e| {
        tracing::error!(url = %url, error = %e, "Invalid downstream response");
        (StatusCode::BAD_GATEWAY, "Invalid downstream response".to_string())
    })?;

    Ok(Json(RelayReport { local, downstream }))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!(
        units_active = Propagator::global().store().len(),
        "Shutdown signal received"
    );
}

//! HTTP surface of the relay.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::engine::apply_mappings_with;
use crate::errors::DeliveryError;
use crate::fields::fields_with_info;
use crate::forwarder::Forwarder;
use crate::observer::{Observer, TracingObserver};
use crate::sink::{DeliverySink, JsonLinesSink, TracingSink};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub forwarder: Arc<Forwarder>,
    pub observer: Arc<dyn Observer>,
}

impl AppState {
    pub fn new(config: RelayConfig, forwarder: Forwarder) -> Self {
        Self {
            config: Arc::new(config),
            forwarder: Arc::new(forwarder),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Wire the sink named by `records.path` (or the log) into a forwarder.
    pub fn from_config(config: RelayConfig) -> Result<Self, DeliveryError> {
        let sink: Arc<dyn DeliverySink> = match &config.records.path {
            Some(path) => Arc::new(JsonLinesSink::new(path.clone())),
            None => Arc::new(TracingSink),
        };
        let forwarder = Forwarder::new(&config.forward, sink)?;
        Ok(Self::new(config, forwarder))
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/hook/:webhook_id", post(receive_hook))
        .route("/fields/extract", post(extract_fields))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn receive_hook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    tracing::info!(%webhook_id, "received webhook");
    let Some(hook) = state.config.webhook(&webhook_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Webhook not found"}))).into_response();
    };

    let transformed = if hook.mappings.is_empty() {
        payload.clone()
    } else {
        apply_mappings_with(&payload, &hook.mappings, state.observer.as_ref())
    };

    match state
        .forwarder
        .forward(&hook.id, &hook.target_url, &payload, &transformed)
        .await
    {
        Ok(response) if response.is_success() => {
            (StatusCode::OK, Json(json!({"status": "delivered"}))).into_response()
        }
        Ok(response) => {
            tracing::error!(%webhook_id, status = response.status, "target returned error status");
            bad_gateway()
        }
        Err(_) => bad_gateway(),
    }
}

fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, Json(json!({"error": "Bad Gateway"}))).into_response()
}

#[derive(Debug, Deserialize)]
struct ExtractRequest {
    #[serde(default)]
    payload: Value,
}

async fn extract_fields(Json(body): Json<ExtractRequest>) -> Json<Value> {
    Json(json!({ "fields": fields_with_info(&body.payload) }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;
use std::time::Instant;

use autodm_bus::EventBus;
use autodm_config::model::{ServerConfig, WebhookConfig};
use autodm_core::error::AutodmError;
use autodm_pipeline::EventIngestor;
use axum::{
    Router, middleware as axum_middleware,
    routing::get,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::sse;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub ingestor: Arc<EventIngestor>,
    pub bus: Arc<EventBus>,
    pub webhook: WebhookConfig,
    pub auth: AuthConfig,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(
        ingestor: Arc<EventIngestor>,
        bus: Arc<EventBus>,
        webhook: WebhookConfig,
        server: &ServerConfig,
    ) -> Self {
        Self {
            ingestor,
            bus,
            webhook,
            auth: AuthConfig {
                bearer_token: server.bearer_token.clone(),
            },
            start_time: Instant::now(),
        }
    }
}

/// Routes:
/// - `GET /health` (public)
/// - `GET|POST /webhook` (platform; POST is signature-checked)
/// - `GET /v1/accounts/{account_id}/events` (bearer auth)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhook",
            get(handlers::verify_webhook).post(handlers::receive_webhook),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/accounts/{account_id}/events", get(sse::account_events))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds `host:port` and serves until `shutdown` fires.
pub async fn serve(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), AutodmError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AutodmError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AutodmError::Internal(format!("gateway server error: {e}")))
}

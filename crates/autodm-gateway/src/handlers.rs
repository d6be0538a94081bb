// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook and health handlers.

use std::collections::HashMap;

use autodm_core::error::AutodmError;
use autodm_pipeline::WebhookEnvelope;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::server::GatewayState;
use crate::signature::{self, SIGNATURE_HEADER};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// `GET /health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Reads `hub.<name>` or, failing that, plain `<name>`.
fn hub_param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(&format!("hub.{name}"))
        .or_else(|| params.get(name))
        .map(String::as_str)
}

/// `GET /webhook`: subscription handshake.
pub async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = hub_param(&params, "mode");
    let token = hub_param(&params, "verify_token");
    let challenge = hub_param(&params, "challenge").unwrap_or_default();

    let expected = state.webhook.verify_token.as_deref();
    if mode == Some("subscribe") && expected.is_some() && token == expected {
        info!("webhook subscription verified");
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            challenge.to_string(),
        )
            .into_response();
    }

    warn!(mode = ?mode, "webhook verification failed");
    (StatusCode::FORBIDDEN, "Verification token mismatch").into_response()
}

/// `POST /webhook`: signed event delivery.
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let presented = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let verified = match state.webhook.app_secret.as_deref() {
        Some(secret) => signature::verify(&body, presented, secret),
        None => {
            error!("webhook app secret not configured -- rejecting delivery");
            false
        }
    };
    if !verified {
        warn!("webhook signature verification failed");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Invalid signature"})),
        )
            .into_response();
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "invalid webhook JSON");
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid JSON"})))
                .into_response();
        }
    };

    let mut created = 0;
    for addressed in envelope.into_events() {
        match state
            .ingestor
            .ingest(&addressed.account_external_id, &addressed.event)
            .await
        {
            Ok(handles) => created += handles.len(),
            Err(AutodmError::UnknownAccount(account)) => {
                warn!(account = %account, "webhook entry for unknown account dropped");
            }
            Err(e) => {
                error!(error = %e, "webhook processing failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Processing failed"})),
                )
                    .into_response();
            }
        }
    }

    info!(triggers = created, "webhook delivery processed");
    (StatusCode::OK, Json(json!({"status": "success"}))).into_response()
}

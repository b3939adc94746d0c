//! Backend-facing JSON API.

use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::protocol::NotificationLevel;
use crate::router::ExecutionPolicy;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub user_id: String,
    pub endpoint: String,
    /// Ordered parameter pairs, e.g. `[["count","10"],["start","0"]]`.
    #[serde(default)]
    pub params: Vec<(String, String)>,
    /// "server" or "delegate"; the configured default applies when absent.
    #[serde(default)]
    pub policy: Option<ExecutionPolicy>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub policy: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

/// `POST /api/execute`
pub async fn execute_handler(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Response {
    let timeout = request.timeout_ms.map(Duration::from_millis);
    let result = state
        .gateway
        .execute(
            &request.user_id,
            &request.endpoint,
            request.params,
            request.policy,
            timeout,
        )
        .await;

    match result {
        Ok(outcome) => Json(ExecuteResponse {
            success: true,
            policy: outcome.policy.as_str(),
            upstream_status: outcome.upstream_status,
            payload: outcome.payload,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default = "default_level")]
    pub level: NotificationLevel,
}

fn default_level() -> NotificationLevel {
    NotificationLevel::Info
}

/// `POST /api/notify`
pub async fn notify_handler(
    State(state): State<AppState>,
    Json(request): Json<NotifyRequest>,
) -> Response {
    match state
        .gateway
        .notify(&request.user_id, &request.message, request.level)
        .await
    {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    connections: usize,
    uptime_secs: u64,
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.registry.len(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

/// Map a gateway error onto an HTTP response.
///
/// Upstream-shaped failures (auth rejection, 5xx, delegate-reported
/// failure, mid-call disconnect) all surface as 502 with a `kind` tag the
/// caller can branch on; the gateway's own conditions get distinct codes.
fn error_response(err: GatewayError) -> Response {
    let status = match &err {
        GatewayError::UnsupportedEndpoint(_) | GatewayError::InvalidParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::IncompleteCredentials(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        GatewayError::NoDelegateAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::AuthRejected { .. }
        | GatewayError::UpstreamError { .. }
        | GatewayError::ClientError { .. }
        | GatewayError::DelegateFailed { .. }
        | GatewayError::Disconnected
        | GatewayError::Transport(_) => StatusCode::BAD_GATEWAY,
        GatewayError::Protocol(_) | GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let retry_after_secs = match &err {
        GatewayError::RateLimited { retry_after } => retry_after.map(|d| d.as_secs()),
        _ => None,
    };

    let body = ErrorBody {
        error: err.kind(),
        message: err.to_string(),
        retry_after_secs,
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(secs) = retry_after_secs {
        if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

//! Aegis Middleware
//!
//! HTTP middleware chain: request ID generation, Basic authentication and
//! simulated fault injection.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::config::BasicAuthConfig;
use crate::handlers::{error_response, ApiResponse};
use crate::state::{AppState, InterceptAction};
use aegis_common::HistorianError;
use aegis_simulation::SimulatedResponse;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use data_encoding::BASE64;
use uuid::Uuid;

// =============================================================================
// Request ID Middleware
// =============================================================================

/// Add a unique request ID to each request.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = Uuid::new_v4().to_string();

    request.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    );

    let mut response = next.run(request).await;

    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    );

    response
}

// =============================================================================
// Basic Authentication Middleware
// =============================================================================

/// Decode an `Authorization: Basic` header into credentials.
fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim().as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn credentials_match(expected: &BasicAuthConfig, header: Option<&str>) -> bool {
    match header.and_then(decode_basic) {
        Some((username, password)) => username == expected.username && password == expected.password,
        None => false,
    }
}

/// Reject requests without valid Basic credentials. `/health` stays open and
/// everything passes when no credentials are configured.
pub async fn basic_auth(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response<Body> {
    let Some(expected) = state.config.auth.as_ref() else {
        return next.run(request).await;
    };
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if credentials_match(expected, header) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
    let err = HistorianError::Configuration("missing or invalid Basic credentials".to_string());
    let mut response = (StatusCode::UNAUTHORIZED, Json(ApiResponse::failure(&err))).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"aegis-historian\""),
    );
    response
}

// =============================================================================
// Fault Injection Middleware
// =============================================================================

fn is_exempt(path: &str) -> bool {
    path == "/health" || path.starts_with("/simulation")
}

fn simulated_response(simulated: SimulatedResponse) -> Response<Body> {
    let status = StatusCode::from_u16(simulated.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, simulated.body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(simulated.content_type),
    );
    if simulated.close_connection {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

/// Consult the error simulator and active edge cases. The decision is taken
/// under the injector lock; any delay is applied after the lock is released
/// and only to the finished response.
pub async fn fault_injection(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response<Body> {
    state.record_request();

    let path = request.uri().path().to_string();
    if is_exempt(&path) {
        return next.run(request).await;
    }

    let method = request.method().as_str().to_string();
    let intercept = state.faults.lock().intercept(&method, &path, Utc::now());

    let response = match intercept.action {
        InterceptAction::Continue => next.run(request).await,
        InterceptAction::Fail(err) => error_response(err),
        InterceptAction::Respond(simulated) => simulated_response(simulated),
    };

    if let Some(delay) = intercept.delay {
        tokio::time::sleep(delay).await;
    }
    response
}

// =============================================================================
// Tests
// =============================================================================

// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers (controller layer).
//
// Handlers stay thin: they extract the request, delegate to the translator
// or the relay, render the outcome and record metrics.
// =============================================================================

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::metrics;
use crate::models::{HealthResponse, StockLookupRequest};
use crate::translator;
use crate::AppState;

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// GET /
///
/// Fixed text, kept for callers that already poll it.
pub async fn root() -> &'static str {
    "✅ Proxy Server Running"
}

/// Liveness probe
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// METRICS ENDPOINT
// =============================================================================
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

// =============================================================================
// STOCK LOOKUP
// =============================================================================
/// Translate a JSON stock lookup into a SOAP call to the ERP
///
/// POST /api
///
/// # Request Body
/// ```json
/// { "STOFCY": "BR01", "ITMREF": "ART-0042", "Authorization": "Basic ..." }
/// ```
///
/// # Response
/// - 200 OK: `{ success: true, count, data, metadata }`
/// - 400 Bad Request: STOFCY or Authorization missing
/// - 5xx: upstream unreachable, rejected, or unreadable; see `errorKind`
///
/// The same fields are accepted as an `application/x-www-form-urlencoded`
/// body. A missing or unparsable body is treated as an empty request, which
/// then fails validation like any other incomplete one.
pub async fn stock_lookup(State(state): State<Arc<AppState>>, body: Request) -> Response {
    let start = Instant::now();

    let request = read_lookup_request(body).await;

    let span = tracing::info_span!(
        "stock_lookup",
        request_id = %Uuid::new_v4(),
        facility = request.facility_code.as_deref().unwrap_or("-")
    );

    let result = translator::translate(state.dispatcher.as_ref(), request)
        .instrument(span)
        .await;

    let response = match result {
        Ok(lookup) => Json(lookup).into_response(),
        Err(err) => err.into_response_with(state.config.diagnostics),
    };

    metrics::record_http_request(
        "POST",
        "/api",
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Extract the lookup fields from a JSON or form-encoded body
async fn read_lookup_request(body: Request) -> StockLookupRequest {
    let is_form = body
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        match Form::<HashMap<String, String>>::from_request(body, &()).await {
            Ok(Form(fields)) => StockLookupRequest::from_form(&fields),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Unreadable form body");
                StockLookupRequest::default()
            }
        }
    } else {
        match Json::<Value>::from_request(body, &()).await {
            Ok(Json(body)) => StockLookupRequest::from_json(&body),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Unreadable JSON body");
                StockLookupRequest::default()
            }
        }
    }
}

// =============================================================================
// RELAY
// =============================================================================
/// Pass-through to the secondary backend
///
/// GET /phprequest
pub async fn relay_request(State(state): State<Arc<AppState>>) -> Response {
    let start = Instant::now();

    let response = match state.relay.forward().await {
        Ok(response) => response,
        Err(err) => err.into_response_with(state.config.diagnostics),
    };

    metrics::record_http_request(
        "GET",
        "/phprequest",
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

// =============================================================================
// PANIC BOUNDARY
// =============================================================================
/// Response for a request whose handler panicked.
///
/// Installed through `CatchPanicLayer`; the failure stays confined to the
/// one request and the server keeps running.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    GatewayError::Internal(detail).into_response()
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

// =============================================================================
// ERROR MODULE
// =============================================================================
// Failure taxonomy of the gateway and its HTTP rendering.
//
// Every failure becomes a `success: false` JSON body. Raw upstream bodies
// are attached wherever one exists, so upstream drift can be diagnosed
// without replaying the call.
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::dispatcher::TransportError;
use crate::models::{FailureResponse, ReceivedEcho};
use crate::unwrapper::UnwrapError;

// =============================================================================
// GATEWAY ERROR
// =============================================================================
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required input missing; raised before any network call
    #[error("Missing required fields: {}", .missing.join(", "))]
    Validation {
        missing: Vec<&'static str>,
        received: ReceivedEcho,
    },

    /// The upstream exchange did not complete
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The upstream answered with a non-2xx status
    #[error("SOAP request failed with status {status}")]
    UpstreamRejection { status: u16, raw_body: String },

    /// The upstream answered 2xx but the payload could not be recovered
    #[error("Failed to parse SOAP response: {source}")]
    Unwrap {
        #[source]
        source: UnwrapError,
        raw_body: String,
    },

    /// GET /phprequest could not reach its backend
    #[error("Failed to forward request to relay backend: {0}")]
    Relay(String),

    /// A handler panicked
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable label for logs, metrics and the `errorKind` field
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "validation",
            GatewayError::Transport(_) => "transport",
            GatewayError::UpstreamRejection { .. } => "upstream_rejection",
            GatewayError::Unwrap { .. } => "unwrap",
            GatewayError::Relay(_) => "relay",
            GatewayError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Transport(err) if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Transport(_) => StatusCode::BAD_GATEWAY,
            // Upstream 5xx passes through; anything else is our bad gateway
            GatewayError::UpstreamRejection { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_server_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            GatewayError::Unwrap { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the JSON failure body.
    ///
    /// `diagnostics` adds the full debug rendering of the error; it is only
    /// switched on outside production.
    pub fn to_failure(&self, diagnostics: bool) -> FailureResponse {
        let mut body = FailureResponse::new(self.kind(), self.to_string());

        match self {
            GatewayError::Validation { missing, received } => {
                body.missing = Some(missing.clone());
                body.received = Some(received.clone());
            }
            GatewayError::Transport(err) => {
                body.message = "Upstream request could not be completed".to_string();
                body.diagnostic_detail = Some(err.to_string());
            }
            GatewayError::UpstreamRejection { status, raw_body } => {
                body.upstream_status = Some(*status);
                body.response = Some(raw_body.clone());
            }
            GatewayError::Unwrap { source, raw_body } => {
                body.message = "Failed to parse SOAP response".to_string();
                body.diagnostic_detail = Some(source.to_string());
                body.response = Some(raw_body.clone());
            }
            GatewayError::Relay(detail) => {
                body.message = "Failed to forward request to relay backend".to_string();
                body.diagnostic_detail = Some(detail.clone());
            }
            GatewayError::Internal(_) => {}
        }

        if diagnostics {
            body.debug = Some(format!("{self:?}"));
        }

        body
    }

    /// Render as an HTTP response, logging the failure
    pub fn into_response_with(self, diagnostics: bool) -> Response {
        let status = self.status_code();

        match &self {
            GatewayError::Validation { missing, .. } => tracing::warn!(
                error_kind = self.kind(),
                missing = ?missing,
                "Rejected request"
            ),
            _ => tracing::error!(
                error_kind = self.kind(),
                status = status.as_u16(),
                message = %self,
                "Request failed"
            ),
        }

        (status, Json(self.to_failure(diagnostics))).into_response()
    }
}

// Without access to the configuration, fall back to the production shape.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn received() -> ReceivedEcho {
        ReceivedEcho {
            facility_code: None,
            item_reference: None,
            credential_present: false,
        }
    }

    #[test]
    fn test_status_codes() {
        let validation = GatewayError::Validation {
            missing: vec!["STOFCY"],
            received: received(),
        };
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);

        let timeout = GatewayError::Transport(TransportError::Timeout("t".into()));
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let connect = GatewayError::Transport(TransportError::Connect("c".into()));
        assert_eq!(connect.status_code(), StatusCode::BAD_GATEWAY);

        let unwrap = GatewayError::Unwrap {
            source: UnwrapError::ResultNodeNotFound,
            raw_body: String::new(),
        };
        assert_eq!(unwrap.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_rejection_status_mapping() {
        let rejection = |status| GatewayError::UpstreamRejection {
            status,
            raw_body: String::new(),
        };

        assert_eq!(rejection(503).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(rejection(500).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rejection(401).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(rejection(302).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_validation_message_lists_missing_fields() {
        let err = GatewayError::Validation {
            missing: vec!["STOFCY", "Authorization"],
            received: received(),
        };

        assert_eq!(err.to_string(), "Missing required fields: STOFCY, Authorization");
        let body = err.to_failure(false);
        assert_eq!(body.missing, Some(vec!["STOFCY", "Authorization"]));
        assert!(!body.success);
    }

    #[test]
    fn test_unwrap_failures_carry_distinct_details_and_raw_body() {
        let not_found = GatewayError::Unwrap {
            source: UnwrapError::ResultNodeNotFound,
            raw_body: "<a/>".into(),
        }
        .to_failure(false);
        let bad_json = GatewayError::Unwrap {
            source: UnwrapError::InvalidEmbeddedJson("expected value".into()),
            raw_body: "<a/>".into(),
        }
        .to_failure(false);

        assert_eq!(not_found.response.as_deref(), Some("<a/>"));
        assert_eq!(bad_json.response.as_deref(), Some("<a/>"));
        assert_ne!(not_found.diagnostic_detail, bad_json.diagnostic_detail);
    }

    #[test]
    fn test_debug_only_in_diagnostic_mode() {
        let err = GatewayError::Internal("boom".into());

        assert!(err.to_failure(false).debug.is_none());
        assert!(err.to_failure(true).debug.unwrap().contains("boom"));
    }
}

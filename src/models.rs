// =============================================================================
// MODELS MODULE
// =============================================================================
// Data structures shared by the pipeline stages and the HTTP layer.
//
// Field names on the wire (STOFCY, ITMREF, Authorization, DETAILS, ...) are
// fixed by the ERP contract, so the Rust names differ from the JSON names and
// serde renames bridge the two.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// INBOUND REQUEST
// =============================================================================

/// Body of `POST /api`, as loosely received from the caller.
///
/// Every field is optional here; presence is checked by
/// [`StockLookupRequest::validate`] before any network I/O.
///
/// # Example JSON
/// ```json
/// { "STOFCY": "BR01", "ITMREF": "ART-0042", "Authorization": "Basic ..." }
/// ```
#[derive(Clone, Default)]
pub struct StockLookupRequest {
    /// Stock facility code (STOFCY), required
    pub facility_code: Option<String>,

    /// Item reference (ITMREF), optional
    pub item_reference: Option<String>,

    /// Opaque credential forwarded verbatim, required
    pub credential: Option<String>,
}

impl StockLookupRequest {
    /// Extract the three known fields from an arbitrary JSON body.
    ///
    /// Strings are taken as-is, numbers are stringified, anything else
    /// (including empty strings) counts as absent.
    pub fn from_json(body: &Value) -> Self {
        Self {
            facility_code: field(body, "STOFCY"),
            item_reference: field(body, "ITMREF"),
            credential: field(body, "Authorization"),
        }
    }

    /// Same extraction for a form-encoded body, where every value is a string
    pub fn from_form(fields: &HashMap<String, String>) -> Self {
        let body = fields
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        Self::from_json(&Value::Object(body))
    }

    /// Wire names of the required fields that are absent, in a fixed order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.facility_code.is_none() {
            missing.push("STOFCY");
        }
        if self.credential.is_none() {
            missing.push("Authorization");
        }
        missing
    }

    /// Echo of what was received, with the credential reduced to a flag
    pub fn received(&self) -> ReceivedEcho {
        ReceivedEcho {
            facility_code: self.facility_code.clone(),
            item_reference: self.item_reference.clone(),
            credential_present: self.credential.is_some(),
        }
    }

    /// Promote to a [`StockLookup`] once both required fields are present.
    ///
    /// On failure the request is handed back so the caller can build the
    /// validation echo from it.
    pub fn validate(self) -> Result<StockLookup, Self> {
        match (self.facility_code, self.credential) {
            (Some(facility_code), Some(credential)) => Ok(StockLookup {
                facility_code,
                item_reference: self.item_reference,
                credential,
            }),
            (facility_code, credential) => Err(Self {
                facility_code,
                item_reference: self.item_reference,
                credential,
            }),
        }
    }
}

fn field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// The credential must never reach the logs.
impl fmt::Debug for StockLookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StockLookupRequest")
            .field("facility_code", &self.facility_code)
            .field("item_reference", &self.item_reference)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A request that passed validation
#[derive(Clone)]
pub struct StockLookup {
    pub facility_code: String,
    pub item_reference: Option<String>,
    pub credential: String,
}

impl StockLookup {
    pub fn request_echo(&self) -> RequestEcho {
        RequestEcho {
            facility_code: self.facility_code.clone(),
            item_reference: self.item_reference.clone(),
        }
    }
}

impl fmt::Debug for StockLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StockLookup")
            .field("facility_code", &self.facility_code)
            .field("item_reference", &self.item_reference)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// What the validation failure echoes back
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReceivedEcho {
    #[serde(rename = "STOFCY", skip_serializing_if = "Option::is_none")]
    pub facility_code: Option<String>,

    #[serde(rename = "ITMREF", skip_serializing_if = "Option::is_none")]
    pub item_reference: Option<String>,

    /// Presence only, never the value
    #[serde(rename = "Authorization")]
    pub credential_present: bool,
}

// =============================================================================
// UPSTREAM EXCHANGE
// =============================================================================

/// The SOAP request document, built once per lookup and discarded after
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapEnvelope(String);

impl SoapEnvelope {
    pub(crate) fn new(xml: String) -> Self {
        Self(xml)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Snapshot of the upstream HTTP exchange. The body is read once and kept
/// for both the success and the failure paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub raw_body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Decoded JSON carried inside the SOAP result node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPayload {
    /// Stock records; empty when DETAILS is missing or null
    pub details: Vec<Value>,

    /// Upstream status block (`XOK`, `XMESS`) when present
    pub header: Option<Value>,
}

// =============================================================================
// OUTBOUND RESPONSES
// =============================================================================

/// Facility and item the caller asked about
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestEcho {
    #[serde(rename = "STOFCY")]
    pub facility_code: String,

    #[serde(rename = "ITMREF", skip_serializing_if = "Option::is_none")]
    pub item_reference: Option<String>,
}

/// Successful body of `POST /api`
///
/// # Example JSON
/// ```json
/// {
///   "success": true,
///   "count": 1,
///   "data": [{ "ITMREF": "ART-0042", "QTY": 12 }],
///   "metadata": {
///     "request": { "STOFCY": "BR01", "ITMREF": "ART-0042" },
///     "timestamp": "2024-05-02T09:14:11.204Z"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct StockLookupResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Value>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub request: RequestEcho,
    pub timestamp: DateTime<Utc>,
}

impl StockLookupResponse {
    pub fn new(request: RequestEcho, payload: ResultPayload) -> Self {
        Self {
            success: true,
            count: payload.details.len(),
            data: payload.details,
            metadata: ResponseMetadata {
                request,
                timestamp: Utc::now(),
            },
        }
    }
}

/// Body of every failed call (`success: false`)
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub success: bool,

    /// Human-readable summary
    pub message: String,

    /// validation, transport, upstream_rejection, unwrap, relay, internal
    pub error_kind: String,

    /// Underlying error text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_detail: Option<String>,

    /// Status code returned by the upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,

    /// Raw upstream body, for offline diagnosis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Required fields that were absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<&'static str>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<ReceivedEcho>,

    /// Full error chain, diagnostic mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

impl FailureResponse {
    pub fn new(error_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_kind: error_kind.into(),
            ..Self::default()
        }
    }
}

// =============================================================================
// HEALTH CHECK RESPONSE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

// =============================================================================
// TRANSLATOR MODULE
// =============================================================================
// Runs one stock lookup end to end:
//
//   Validating → Building → Dispatching → Unwrapping → Succeeded | Failed
//
// Nothing is kept between calls and nothing is retried. Each stage failure
// maps to exactly one GatewayError variant.
// =============================================================================

use std::fmt;

use crate::dispatcher::Dispatcher;
use crate::envelope;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::models::{StockLookupRequest, StockLookupResponse};
use crate::unwrapper;

/// Pipeline stage, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Building,
    Dispatching,
    Unwrapping,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Building => "building",
            Stage::Dispatching => "dispatching",
            Stage::Unwrapping => "unwrapping",
        };
        f.write_str(name)
    }
}

/// Translate a JSON stock lookup into a SOAP call and back.
pub async fn translate(
    dispatcher: &dyn Dispatcher,
    request: StockLookupRequest,
) -> GatewayResult<StockLookupResponse> {
    let result = run(dispatcher, request).await;

    match &result {
        Ok(response) => metrics::record_records_returned(response.count),
        Err(err) => metrics::record_translation_failure(err.kind()),
    }

    result
}

async fn run(
    dispatcher: &dyn Dispatcher,
    request: StockLookupRequest,
) -> GatewayResult<StockLookupResponse> {
    tracing::debug!(stage = %Stage::Validating, request = ?request);
    let lookup = request.validate().map_err(|rejected| GatewayError::Validation {
        missing: rejected.missing_fields(),
        received: rejected.received(),
    })?;

    tracing::debug!(stage = %Stage::Building, facility = %lookup.facility_code);
    let envelope = envelope::build(&lookup.facility_code, lookup.item_reference.as_deref());

    tracing::debug!(stage = %Stage::Dispatching);
    let upstream = dispatcher.send(&envelope, &lookup.credential).await?;
    drop(envelope);

    if !upstream.is_success() {
        return Err(GatewayError::UpstreamRejection {
            status: upstream.status,
            raw_body: upstream.raw_body,
        });
    }

    tracing::debug!(stage = %Stage::Unwrapping, body_len = upstream.raw_body.len());
    let payload = match unwrapper::unwrap(&upstream.raw_body) {
        Ok(payload) => payload,
        Err(source) => {
            return Err(GatewayError::Unwrap {
                source,
                raw_body: upstream.raw_body,
            })
        }
    };

    if let Some(header) = &payload.header {
        tracing::debug!(
            xok = %header.get("XOK").unwrap_or(&serde_json::Value::Null),
            xmess = %header.get("XMESS").unwrap_or(&serde_json::Value::Null),
            "Upstream result header"
        );
    }

    let response = StockLookupResponse::new(lookup.request_echo(), payload);
    tracing::info!(count = response.count, "Stock lookup succeeded");

    Ok(response)
}

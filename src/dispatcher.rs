// =============================================================================
// DISPATCHER MODULE
// =============================================================================
// Sends the SOAP envelope to the ERP and hands back the raw exchange.
//
// The dispatcher owns no parsing logic: any HTTP status, 2xx or not, comes
// back as an UpstreamResponse. Only failures to complete the exchange at all
// (DNS, connect, timeout, body read) are TransportErrors.
// =============================================================================

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use thiserror::Error;

use crate::config::Config;
use crate::metrics;
use crate::models::{SoapEnvelope, UpstreamResponse};

// =============================================================================
// TRANSPORT ERRORS
// =============================================================================
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response within the configured timeout
    #[error("upstream timed out: {0}")]
    Timeout(String),

    /// DNS resolution or TCP/TLS connection failed
    #[error("could not connect to upstream: {0}")]
    Connect(String),

    /// The request could not be sent, or its body could not be read
    #[error("upstream request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Connect(message)
        } else {
            TransportError::Request(message)
        }
    }
}

// =============================================================================
// DISPATCHER TRAIT
// =============================================================================
/// Anything that can deliver a SOAP envelope to the ERP.
///
/// The orchestrator only sees this trait, which lets tests swap in a stub
/// that records whether the network was ever touched.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(
        &self,
        envelope: &SoapEnvelope,
        credential: &str,
    ) -> Result<UpstreamResponse, TransportError>;
}

// =============================================================================
// HTTP DISPATCHER
// =============================================================================
/// Reqwest-backed dispatcher for the ERP SOAP endpoint
#[derive(Debug, Clone)]
pub struct SoapDispatcher {
    client: reqwest::Client,
    url: String,
    soap_action: String,
    cookie: String,
}

impl SoapDispatcher {
    /// Build the dispatcher and its dedicated HTTP client.
    ///
    /// Certificate verification is turned off on this client only: the ERP
    /// endpoint is fixed and serves a certificate that does not chain to a
    /// public root. No other outbound client shares this setting.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.upstream_timeout)
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            url: config.upstream_url.clone(),
            soap_action: config.soap_action.clone(),
            cookie: config.upstream_cookie.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Dispatcher for SoapDispatcher {
    async fn send(
        &self,
        envelope: &SoapEnvelope,
        credential: &str,
    ) -> Result<UpstreamResponse, TransportError> {
        let start = Instant::now();
        tracing::debug!(url = %self.url, "Sending SOAP request");

        let result = self.exchange(envelope, credential).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    status = response.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Received upstream response"
                );
                metrics::record_upstream_call(&response.status.to_string(), elapsed.as_secs_f64());
            }
            Err(err) => {
                tracing::warn!(error = %err, "Upstream exchange failed");
                let outcome = if err.is_timeout() { "timeout" } else { "transport_error" };
                metrics::record_upstream_call(outcome, elapsed.as_secs_f64());
            }
        }

        result
    }
}

impl SoapDispatcher {
    async fn exchange(
        &self,
        envelope: &SoapEnvelope,
        credential: &str,
    ) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", &self.soap_action)
            .header(AUTHORIZATION, credential)
            .header(COOKIE, &self.cookie)
            .body(envelope.as_str().to_owned())
            .send()
            .await?;

        let status = response.status().as_u16();

        // Single read, whatever the status
        let raw_body = response.text().await?;

        Ok(UpstreamResponse { status, raw_body })
    }
}

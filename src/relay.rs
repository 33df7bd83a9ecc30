// =============================================================================
// RELAY MODULE
// =============================================================================
// GET /phprequest: forwards a GET to the secondary backend and returns its
// status and body unmodified.
//
// This client keeps the default TLS policy. The certificate exception of the
// SOAP dispatcher does not apply here.
// =============================================================================

use anyhow::{Context, Result};
use axum::response::{IntoResponse, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .context("Failed to build relay HTTP client")?;

        Ok(Self {
            client,
            url: config.relay_url.clone(),
        })
    }

    /// Fetch the backend page and mirror its status and body
    pub async fn forward(&self) -> GatewayResult<Response> {
        tracing::info!(url = %self.url, "Forwarding request to relay backend");

        let response = self
            .client
            .get(&self.url)
            .header(CONTENT_TYPE, "text/html")
            .header(ACCEPT, "text/html")
            .send()
            .await
            .map_err(|e| GatewayError::Relay(e.to_string()))?;

        // reqwest and axum share the `http` crate types
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Relay(e.to_string()))?;

        let mut relayed = (status, body).into_response();
        if let Some(content_type) = content_type {
            relayed.headers_mut().insert(CONTENT_TYPE, content_type);
        }

        Ok(relayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relay_to(url: String) -> RelayClient {
        let config = Config {
            port: 0,
            upstream_url: "http://127.0.0.1:9/unused".to_string(),
            soap_action: "run".to_string(),
            upstream_cookie: String::new(),
            upstream_timeout: Duration::from_secs(5),
            relay_url: url,
            diagnostics: false,
        };
        RelayClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_forward_mirrors_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test.php"))
            .and(header("accept", "text/html"))
            .respond_with(
                ResponseTemplate::new(418)
                    .set_body_raw("<p>teapot</p>", "text/html; charset=utf-8"),
            )
            .mount(&mock_server)
            .await;

        let relay = relay_to(format!("{}/test.php", mock_server.uri()));
        let response = relay.forward().await.unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<p>teapot</p>");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_relay_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let relay = relay_to(format!("http://{addr}/test.php"));
        let err = relay.forward().await.unwrap_err();

        assert_eq!(err.kind(), "relay");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_self_signed_backend_certificate_is_rejected() {
        let base = crate::test_support::self_signed_https_server("<p>ok</p>").await;

        let relay = relay_to(format!("{base}/test.php"));
        let err = relay.forward().await.unwrap_err();

        assert!(matches!(err, GatewayError::Relay(_)), "got {err:?}");
    }
}

// =============================================================================
// CONFIGURATION MODULE
// =============================================================================
// This module handles loading configuration from environment variables.
//
// Every setting has a default that reproduces the fixed endpoints the
// gateway was originally deployed against, so an empty environment still
// yields a working service.
// =============================================================================

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

// -----------------------------------------------------------------------------
// DEFAULTS
// -----------------------------------------------------------------------------
const DEFAULT_PORT: &str = "3030";

const DEFAULT_UPSTREAM_URL: &str = "https://br-api.silent-believers.com/soap-generic/syracuse/collaboration/syracuse/CAdxWebServiceXmlCC";

const DEFAULT_SOAP_ACTION: &str = "run";

/// Session-affinity cookie the ERP load balancer routes on.
const DEFAULT_UPSTREAM_COOKIE: &str = "client.id=daebf90c-3ce8-4fc4-b872-4434887b6a7d; syracuse.sid.8124=8ab95612-d920-43a5-be6c-9d71d6773d51";

const DEFAULT_UPSTREAM_TIMEOUT_SECS: &str = "30";

const DEFAULT_RELAY_URL: &str = "http://localhost:3001/test.php";

// -----------------------------------------------------------------------------
// CONFIG STRUCT
// -----------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3030)
    pub port: u16,

    /// Upstream SOAP endpoint
    pub upstream_url: String,

    /// Value of the SOAPAction header
    pub soap_action: String,

    /// Static Cookie header sent with every upstream call
    pub upstream_cookie: String,

    /// Outbound timeout for the SOAP call
    pub upstream_timeout: Duration,

    /// Secondary backend behind GET /phprequest
    pub relay_url: String,

    /// Include debug detail in failure bodies (APP_ENV=development)
    pub diagnostics: bool,
}

impl Config {
    // -------------------------------------------------------------------------
    // LOAD CONFIGURATION FROM ENVIRONMENT
    // -------------------------------------------------------------------------
    /// Creates a Config by reading environment variables.
    ///
    /// # Returns
    /// - `Ok(Config)` when every set variable parses
    /// - `Err` if PORT or UPSTREAM_TIMEOUT_SECS is not a number
    pub fn from_env() -> Result<Self> {
        let timeout_secs: u64 = var_or("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)
            .parse()
            .context("Failed to parse UPSTREAM_TIMEOUT_SECS as a number")?;

        Ok(Self {
            port: var_or("PORT", DEFAULT_PORT)
                .parse()
                .context("Failed to parse PORT as a number")?,
            upstream_url: var_or("UPSTREAM_URL", DEFAULT_UPSTREAM_URL),
            soap_action: var_or("UPSTREAM_SOAP_ACTION", DEFAULT_SOAP_ACTION),
            upstream_cookie: var_or("UPSTREAM_COOKIE", DEFAULT_UPSTREAM_COOKIE),
            upstream_timeout: Duration::from_secs(timeout_secs),
            relay_url: var_or("RELAY_URL", DEFAULT_RELAY_URL),
            diagnostics: var_or("APP_ENV", "production").eq_ignore_ascii_case("development"),
        })
    }
}

/// Read an environment variable, falling back to `default` when unset
fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // All environment mutation lives in this single test; the test harness
    // runs tests in parallel and the environment is process-wide.
    #[test]
    fn test_config_from_env() {
        // Defaults first
        for key in [
            "PORT",
            "UPSTREAM_URL",
            "UPSTREAM_SOAP_ACTION",
            "UPSTREAM_COOKIE",
            "UPSTREAM_TIMEOUT_SECS",
            "RELAY_URL",
            "APP_ENV",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().expect("Failed to load default config");
        assert_eq!(config.port, 3030);
        assert_eq!(config.soap_action, "run");
        assert!(config.upstream_url.starts_with("https://"));
        assert!(config.upstream_cookie.contains("client.id="));
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.relay_url, "http://localhost:3001/test.php");
        assert!(!config.diagnostics);

        // Overrides
        env::set_var("PORT", "9000");
        env::set_var("UPSTREAM_TIMEOUT_SECS", "5");
        env::set_var("APP_ENV", "Development");

        let config = Config::from_env().expect("Failed to load config");
        assert_eq!(config.port, 9000);
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
        assert!(config.diagnostics);

        // Bad numbers are startup errors
        env::set_var("PORT", "not-a-port");
        assert!(Config::from_env().is_err());

        // Clean up
        env::remove_var("PORT");
        env::remove_var("UPSTREAM_TIMEOUT_SECS");
        env::remove_var("APP_ENV");
    }
}

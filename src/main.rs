// =============================================================================
// STOCK GATEWAY - Main Entry Point
// =============================================================================
// JSON-to-SOAP gateway in front of the ERP stock lookup web service.
//
// WHAT THIS SERVICE DOES:
// - POST /api: takes { STOFCY, ITMREF, Authorization }, calls the ERP's
//   SOAP `run` operation (XGETSTOCK) and returns the stock records as JSON
// - GET /phprequest: relays a GET to a local secondary backend
// - GET /, /health: liveness
// - GET /metrics: Prometheus metrics
// =============================================================================

// -----------------------------------------------------------------------------
// MODULE DECLARATIONS
// -----------------------------------------------------------------------------
mod config; // Configuration loading
mod dispatcher; // Upstream SOAP dispatch
mod envelope; // SOAP request construction
mod error; // Error taxonomy and HTTP rendering
mod handlers; // HTTP request handlers
mod metrics; // Prometheus metrics setup
mod models; // Data structures
mod relay; // GET /phprequest pass-through
mod translator; // Lookup pipeline
mod unwrapper; // SOAP response decoding

#[cfg(test)]
mod test_support; // Self-signed HTTPS server for tests

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::dispatcher::{Dispatcher, SoapDispatcher};
use crate::metrics::setup_metrics;
use crate::relay::RelayClient;

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
// Shared by all handlers, read-only. Per-request data never lives here.
pub struct AppState {
    pub config: Config,

    /// Upstream SOAP dispatcher (the only client with relaxed TLS)
    pub dispatcher: Arc<dyn Dispatcher>,

    /// Client for GET /phprequest
    pub relay: RelayClient,

    /// Prometheus metrics handle
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

// -----------------------------------------------------------------------------
// ROUTER
// -----------------------------------------------------------------------------
/// Build the application router.
///
/// The panic layer sits innermost so a panicking handler still passes
/// through tracing and CORS on its way out.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // ----- Health & Metrics -----
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        // ----- Gateway -----
        .route("/api", post(handlers::stock_lookup))
        .route("/phprequest", get(handlers::relay_request))
        .fallback(handlers::not_found)
        // ----- Middleware Layers -----
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// -----------------------------------------------------------------------------
// MAIN FUNCTION
// -----------------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // STEP 1: Load environment variables
    // -------------------------------------------------------------------------
    dotenvy::dotenv().ok(); // .env is optional

    // -------------------------------------------------------------------------
    // STEP 2: Initialize logging/tracing
    // -------------------------------------------------------------------------
    // RUST_LOG controls log levels, e.g. RUST_LOG=info,stock_gateway=debug
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stock_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Stock Gateway...");

    // -------------------------------------------------------------------------
    // STEP 3: Load configuration
    // -------------------------------------------------------------------------
    let config = Config::from_env()?;
    info!(
        port = config.port,
        upstream_timeout_secs = config.upstream_timeout.as_secs(),
        diagnostics = config.diagnostics,
        "Configuration loaded"
    );

    // -------------------------------------------------------------------------
    // STEP 4: Set up Prometheus metrics
    // -------------------------------------------------------------------------
    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    // -------------------------------------------------------------------------
    // STEP 5: Build outbound clients
    // -------------------------------------------------------------------------
    let dispatcher = SoapDispatcher::from_config(&config)?;
    info!(upstream = %dispatcher.url(), "Upstream dispatcher ready");

    let relay = RelayClient::from_config(&config)?;

    // -------------------------------------------------------------------------
    // STEP 6: Create application state and routes
    // -------------------------------------------------------------------------
    let port = config.port;
    let state = Arc::new(AppState {
        config,
        dispatcher: Arc::new(dispatcher),
        relay,
        metrics_handle,
    });

    let app = router(state);

    // -------------------------------------------------------------------------
    // STEP 7: Start the HTTP server
    // -------------------------------------------------------------------------
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Stock Gateway is listening");

    axum::serve(listener, app).await?;

    Ok(())
}

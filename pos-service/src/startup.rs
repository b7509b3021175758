//! Application startup and lifecycle management.
//!
//! Builds the shared state (database pool, submission client, tax rule),
//! binds the listener, and runs the HTTP server. The authority client
//! implementation is chosen here from configuration; the pipeline itself
//! never branches on the environment.

use crate::config::{AuthorityMode, Config};
use crate::fiscal::authority::AuthorityCredentials;
use crate::fiscal::{
    AuthorityClient, HttpAuthorityClient, MockAuthorityClient, StandardVatRule, SubmissionClient,
    TaxRule,
};
use crate::handlers::{invoices, orders, products, reports};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::services::{get_metrics, init_metrics, Database};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub submitter: Arc<SubmissionClient>,
    pub tax_rule: Arc<dyn TaxRule>,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "pos-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "pos-service",
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let authority: Arc<dyn AuthorityClient> = match config.authority.mode {
            AuthorityMode::Live => {
                tracing::info!(endpoint = %config.authority.endpoint, "Using live tax authority");
                Arc::new(HttpAuthorityClient::new(
                    config.authority.endpoint.clone(),
                    AuthorityCredentials {
                        tpin: config.authority.tpin.clone(),
                        bhf_id: config.authority.bhf_id.clone(),
                        device_serial: config.authority.device_serial.clone(),
                        api_key: config.authority.api_key.clone(),
                    },
                    config.authority.request_timeout,
                ))
            }
            AuthorityMode::Mock => {
                tracing::warn!("Using in-process mock tax authority - submissions are not real");
                Arc::new(MockAuthorityClient::new(true))
            }
        };

        let submitter = Arc::new(SubmissionClient::new(
            authority,
            config.authority.retry_policy(),
            config.authority.success_rule,
        ));
        let tax_rule: Arc<dyn TaxRule> = Arc::new(StandardVatRule);

        init_metrics();

        let state = AppState {
            db,
            config: config.clone(),
            submitter,
            tax_rule,
        };

        // Bind HTTP listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("POS service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a handle to the database.
    pub fn db(&self) -> Database {
        self.state.db.clone()
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_endpoint))
            .route(
                "/products",
                post(products::create_product).get(products::list_products),
            )
            .route("/products/:product_id", get(products::get_product))
            .route("/orders", post(orders::create_order))
            .route("/orders/:order_id", get(orders::get_order))
            .route("/invoices", post(invoices::create_invoice))
            .route("/invoices/:invoice_id/submit", post(invoices::submit_invoice))
            .route(
                "/submissions/:invoice_number",
                get(invoices::get_submission_log),
            )
            .route("/reports/daily", get(reports::daily_report))
            .route("/reports/monthly", get(reports::monthly_report))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        axum::serve(self.listener, router).await
    }
}

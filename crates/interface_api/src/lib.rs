//! HTTP API Layer
//!
//! This crate provides the REST API for the billing ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for invoices, payments and statistics
//! - **Middleware**: Request ids, tracing, audit logging
//! - **DTOs**: Response data transfer objects
//! - **Error Handling**: Consistent JSON error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(store, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_billing::{InvoiceLedger, LedgerStore, PaymentProcessor, RetryPolicy};

use crate::config::ApiConfig;
use crate::handlers::{health, invoices, payments, stats};
use crate::middleware::audit_middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub ledger: InvoiceLedger,
    pub processor: PaymentProcessor,
    pub retry: RetryPolicy,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, config: ApiConfig) -> Self {
        Self {
            ledger: InvoiceLedger::new(store.clone(), config.ledger_settings()),
            processor: PaymentProcessor::new(store.clone()),
            retry: config.retry_policy(),
            store,
            config,
        }
    }
}

/// Creates the main API router over the given ledger store
pub fn create_router(store: Arc<dyn LedgerStore>, config: ApiConfig) -> Router {
    let state = AppState::new(store, config);

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let invoice_routes = Router::new()
        .route("/", post(invoices::create_invoice))
        .route(
            "/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/:id/balance", get(invoices::invoice_balance));

    let case_routes = Router::new()
        .route("/:case_id/invoices", get(invoices::case_invoices))
        .route("/:case_id/payments", get(payments::case_payments));

    let api_routes = Router::new()
        .nest("/invoices", invoice_routes)
        .route("/payments", post(payments::record_payment))
        .nest("/cases", case_routes)
        .route("/stats", get(stats::billing_stats))
        .layer(axum_middleware::from_fn(audit_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

//! HTTP API for the registration service.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{logging_middleware, rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::service::RegistrationService;
use crate::store::Store;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Registration flow
    pub service: Arc<RegistrationService>,
    /// Backing store, for health reporting
    pub store: Arc<Store>,
    /// Echo issued passcodes in the send-otp response
    pub expose_passcode: bool,
}

impl AppState {
    /// Create new application state.
    pub fn new(service: RegistrationService, store: Arc<Store>) -> Self {
        Self {
            service: Arc::new(service),
            store,
            expose_passcode: false,
        }
    }

    pub fn with_exposed_passcode(mut self, expose: bool) -> Self {
        self.expose_passcode = expose;
        self
    }
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    let api = Router::new()
        .route("/api/send-otp", post(handlers::send_otp))
        .route("/api/verify-otp", post(handlers::verify_otp))
        .route("/api/register", post(handlers::register))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    Router::new()
        // Health check (no rate limiting)
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! Identity Registration - Entry point.

use identity_registration::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    config::{Config, LogConfig},
    IdentifierHasher, RegistrationService, Store,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log);

    info!("Starting Identity Registration service");

    let hasher = match IdentifierHasher::new(&config.identity.secret) {
        Ok(h) => h,
        Err(e) => {
            error!("Invalid identity configuration: {}", e);
            std::process::exit(1);
        }
    };

    // A store we cannot open is fatal; there is no retry loop.
    let store = match Store::open(&config.store.url, &config.identity.secret).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let stats = store.stats().await;
    info!(
        backend = store.backend(),
        challenges = stats.challenges,
        accounts = stats.accounts,
        "Store ready"
    );

    let service = RegistrationService::new(
        hasher,
        store.clone(),
        store.clone(),
        config.service_settings(),
    );

    if config.otp.expose_in_response {
        warn!("OTP__EXPOSE_IN_RESPONSE is enabled: passcodes are returned to callers");
    }

    let state = AppState::new(service, store).with_exposed_passcode(config.otp.expose_in_response);

    let rate_limit = RateLimitState::new(config.rate_limit.global_per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    let addr = match config.server.socket_addr() {
        Ok(a) => a,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server running on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

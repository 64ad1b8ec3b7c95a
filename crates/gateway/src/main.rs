//! Onsite Atlas API Gateway
//!
//! REST backend for the abstract review workflow.
//! Handles:
//! - Bearer-token authentication and role checks
//! - Rate limiting
//! - Abstract, review, assignment, export and settings routes
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod telemetry;

#[cfg(test)]
mod tests;

use atlas_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    metrics, AbstractStore, InMemoryStore,
};
use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AbstractStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::load()?);

    let tracer_provider = telemetry::init_tracing(&config.observability)?;
    info!("Starting Onsite Atlas API Gateway v{}", atlas_common::VERSION);

    // Initialize metrics
    telemetry::install_prometheus(config.observability.metrics_port)?;
    metrics::register_metrics();

    let store: Arc<dyn AbstractStore> = match &config.database {
        Some(db_config) => {
            info!("Connecting to database...");
            let pool = DbPool::new(db_config).await?;
            Arc::new(Repository::new(pool))
        }
        None => {
            warn!("No database configured, using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let jwt_secret = match config.auth.jwt_secret.clone() {
        Some(secret) => secret,
        None => anyhow::bail!("auth.jwt_secret must be set"),
    };
    let jwt = Arc::new(JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs));

    let state = AppState {
        config: config.clone(),
        store,
    };

    let app = create_router(state, jwt);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            warn!(error = %e, "Failed to flush traces");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState, jwt: Arc<JwtManager>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let abstracts = Router::new()
        .route(
            "/",
            get(handlers::abstracts::list_own).post(handlers::abstracts::create),
        )
        .route("/all-event-abstracts", get(handlers::abstracts::list_event))
        .route("/assign-reviewers", post(handlers::assignment::assign_reviewers))
        .route("/auto-assign-reviewers", post(handlers::assignment::auto_assign))
        .route("/download", get(handlers::export::download))
        .route(
            "/{aid}",
            get(handlers::abstracts::get_one)
                .put(handlers::abstracts::update)
                .delete(handlers::abstracts::delete),
        )
        .route("/{aid}/status", put(handlers::abstracts::update_status))
        .route("/{aid}/file", post(handlers::abstracts::attach_file))
        .route("/{aid}/registration-proof", post(handlers::abstracts::upload_registration_proof))
        .route("/{aid}/final-file", post(handlers::abstracts::upload_final_file))
        .route("/{aid}/verify-registration", put(handlers::abstracts::verify_registration))
        .route("/{aid}/request-revision", post(handlers::abstracts::request_revision))
        .route("/{aid}/review", post(handlers::reviews::submit_review));

    let api_routes = Router::new()
        .nest("/events/{event_id}/abstracts", abstracts)
        .route(
            "/events/{event_id}/abstract-settings",
            get(handlers::settings::get_settings).put(handlers::settings::put_settings),
        );

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests));

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let limiter = middleware::rate_limit::RateLimit::new(limits.requests_per_second, limits.burst);
        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    let timeout = TimeoutLayer::new(state.config.request_timeout());
    let concurrency = ConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests.max(1));

    // Compose the app
    app.layer(Extension(jwt))
        .layer(timeout)
        .layer(concurrency)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

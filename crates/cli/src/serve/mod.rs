//! `sustain serve` -- HTTP JSON API over the manager registry.
//!
//! Security features:
//! - CORS headers on all responses (permissive)
//! - Per-IP rate limiting (default: 60 req/min, `[server] rate_limit`)
//! - Optional API key authentication (`[server] api_key` / SUSTAIN_API_KEY)
//!
//! Endpoints:
//! - GET  /health                       - Server status (exempt from auth)
//! - GET  /managers?status=&limit=      - List verification records
//! - GET  /managers/{manager}           - Verification record
//! - GET  /managers/{manager}/verified  - `{manager, verified}`
//! - POST /managers/{manager}/verify    - Verify (owner only)
//! - POST /managers/{manager}/revoke    - Revoke (owner only)
//! - GET  /managers/{manager}/history   - Audit events for one manager
//! - GET  /history?limit=               - Full audit log
//! - GET  /audit                        - Hash-chain check
//! - GET  /owner                        - Current owner
//! - POST /owner/transfer               - Transfer ownership (owner only)
//!
//! Errors are `{code, message}` JSON. Registry errors also carry `detail`.

mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use sustain_registry::{FileStorage, ManagerRegistry};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use self::handlers::{
    handle_audit, handle_get_manager, handle_health, handle_history, handle_is_verified,
    handle_list_managers, handle_manager_history, handle_not_found, handle_owner, handle_revoke,
    handle_transfer_owner, handle_verify,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::config::ServerConfig;

/// Maximum request body size: 64 KiB.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// JSON error for failures outside the registry (routing, auth, limits).
/// The code is the HTTP status.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({"code": status.as_u16(), "message": message})),
    )
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/managers", get(handle_list_managers))
        .route("/managers/{manager}", get(handle_get_manager))
        .route("/managers/{manager}/verified", get(handle_is_verified))
        .route("/managers/{manager}/verify", post(handle_verify))
        .route("/managers/{manager}/revoke", post(handle_revoke))
        .route("/managers/{manager}/history", get(handle_manager_history))
        .route("/history", get(handle_history))
        .route("/audit", get(handle_audit))
        .route("/owner", get(handle_owner))
        .route("/owner/transfer", post(handle_transfer_owner))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `registry` until Ctrl+C.
pub(crate) async fn start_server(
    config: &ServerConfig,
    registry: ManagerRegistry<FileStorage>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.api_key.is_some() {
        info!("API key authentication enabled");
    }
    info!(
        rate_limit = config.rate_limit,
        "rate limit: {} requests per minute per IP", config.rate_limit
    );

    let state_file = registry.storage().path().display().to_string();
    let state = Arc::new(AppState {
        registry,
        rate_limiter: RateLimiter::new(config.rate_limit),
        api_key: config.api_key.clone(),
    });

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(state = %state_file, "sustain registry listening on http://{}", addr);
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}

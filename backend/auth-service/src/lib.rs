// Auth Service Library

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod rate_limit;
pub mod security;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod validators;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use token_core::TokenService;
use tower_http::trace::TraceLayer;

use rate_limit::RateLimiter;
use services::{AuthService, OAuthFederator};

pub use error::{AuthError, Result};

// Re-export commonly used types
pub use models::{Account, PublicAccount, Session};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub oauth: Arc<OAuthFederator>,
    pub limiter: Arc<RateLimiter>,
    pub tokens: Arc<TokenService>,
}

/// Lets extractors that only need token verification pull the service
/// straight out of the state.
impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// Build the REST API router with all routes and middleware attached.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        // Authentication endpoints
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/refresh", post(handlers::refresh))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route(
            "/api/v1/auth/sessions/revoke-all",
            post(handlers::revoke_all_sessions),
        )
        .route(
            "/api/v1/auth/password-reset/request",
            post(handlers::request_password_reset),
        )
        .route(
            "/api/v1/auth/password-reset/confirm",
            post(handlers::reset_password),
        )
        // OAuth endpoints
        .route("/api/v1/oauth/authorize", get(handlers::authorize))
        .route("/api/v1/oauth/callback", get(handlers::callback))
        // Health checks
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(openapi::swagger_routes())
        .layer(axum::middleware::from_fn(metrics::track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness_check() -> &'static str {
    "READY"
}

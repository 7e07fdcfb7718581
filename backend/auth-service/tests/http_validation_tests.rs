use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use auth_service::config::{
    LockoutSettings, RateLimitSettings, SecuritySettings, SessionSettings,
};
use auth_service::rate_limit::RateLimiter;
use auth_service::security::LockoutGuard;
use auth_service::services::{AuthService, LogNotifier, OAuthFederator, SessionManager};
use auth_service::store::{
    MemoryAccountStore, MemoryRateWindows, MemorySessionStore, MemoryStateStore,
};
use auth_service::{app_router, AppState};
use token_core::TokenService;

fn build_app() -> Router {
    let accounts = Arc::new(MemoryAccountStore::new());
    let tokens = Arc::new(TokenService::new(
        "access-secret-under-test",
        "refresh-secret-under-test",
        chrono::Duration::minutes(15),
        chrono::Duration::days(30),
    ));
    let sessions = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        &SessionSettings {
            absolute_ttl_secs: 900,
            idle_timeout_secs: 1800,
            cookie_secure: false,
        },
    );
    let auth = Arc::new(AuthService::new(
        accounts.clone(),
        sessions,
        tokens.clone(),
        LockoutGuard::from_settings(&LockoutSettings {
            max_attempts: 5,
            lockout_duration_secs: 900,
        }),
        Arc::new(LogNotifier),
        &SecuritySettings {
            require_verified_email: false,
        },
    ));
    let oauth = Arc::new(OAuthFederator::with_providers(
        accounts,
        Arc::new(MemoryStateStore::new()),
        Vec::new(),
        600,
    ));
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(MemoryRateWindows::new()),
        &RateLimitSettings {
            window_secs: 60,
            login_max: 1000,
            register_max: 1000,
            refresh_max: 1000,
            oauth_max: 1000,
            password_reset_max: 1000,
        },
    ));

    app_router(AppState {
        auth,
        oauth,
        limiter,
        tokens,
    })
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

#[tokio::test]
async fn register_invalid_email_returns_400() {
    let app = build_app();

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/register",
        json!({
            "email": "invalid",
            "password": "Secure!Pass123",
            "acceptTerms": true,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn register_weak_password_returns_400() {
    let app = build_app();

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/register",
        json!({
            "email": "user@example.com",
            "password": "weakpass",
            "acceptTerms": true,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "weak_password");
}

#[tokio::test]
async fn register_without_accepting_terms_returns_400() {
    let app = build_app();

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/register",
        json!({
            "email": "user@example.com",
            "password": "Secure!Pass123",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
}

#[tokio::test]
async fn register_duplicate_email_returns_409() {
    let app = build_app();

    let payload = json!({
        "email": "dup@example.com",
        "password": "Secure!Pass123",
        "acceptTerms": true,
    });
    let (first, _) = post_json(&app, "/api/v1/auth/register", payload.clone()).await;
    assert_eq!(first, StatusCode::CREATED);

    // Same address with different case still collides
    let (second, body) = post_json(
        &app,
        "/api/v1/auth/register",
        json!({
            "email": "DUP@Example.com",
            "password": "Secure!Pass123",
            "acceptTerms": true,
        }),
    )
    .await;

    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email_exists");
}

#[tokio::test]
async fn login_missing_password_returns_400() {
    let app = build_app();

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/login",
        json!({
            "email": "user@example.com",
            "password": "",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
}

#[tokio::test]
async fn refresh_empty_token_returns_400() {
    let app = build_app();

    let (status, body) = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
}

#[tokio::test]
async fn unknown_oauth_provider_returns_400() {
    let app = build_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/oauth/authorize?provider=gitlab&redirectUri=https://app.example.com/cb")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["error"], "unknown_provider");
}

#[tokio::test]
async fn error_bodies_share_the_uniform_shape() {
    let app = build_app();

    let (_, invalid_email) = post_json(
        &app,
        "/api/v1/auth/register",
        json!({ "email": "bad", "password": "Secure!Pass123", "acceptTerms": true }),
    )
    .await;
    let (_, wrong_password) = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "ghost@example.com", "password": "Secure!Pass123" }),
    )
    .await;

    for body in [invalid_email, wrong_password] {
        assert!(body["error"].is_string());
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = build_app();

    for uri in ["/health", "/readiness"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}

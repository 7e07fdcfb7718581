use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use auth_service::config::{
    LockoutSettings, RateLimitSettings, SecuritySettings, SessionSettings,
};
use auth_service::rate_limit::RateLimiter;
use auth_service::security::LockoutGuard;
use auth_service::services::{
    AuthService, OAuthFederator, SecurityNotifier, SessionManager,
};
use auth_service::store::{
    MemoryAccountStore, MemoryRateWindows, MemorySessionStore, MemoryStateStore,
};
use auth_service::{app_router, AppState};
use token_core::TokenService;

/// Captures outbound notifications so tests can read the raw reset token.
#[derive(Default)]
struct RecordingNotifier {
    reset_tokens: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn last_reset_token(&self) -> Option<String> {
        self.reset_tokens
            .lock()
            .expect("notifier lock")
            .last()
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl SecurityNotifier for RecordingNotifier {
    async fn password_reset_requested(
        &self,
        email: &str,
        reset_token: &str,
        _expires_at: DateTime<Utc>,
    ) {
        self.reset_tokens
            .lock()
            .expect("notifier lock")
            .push((email.to_string(), reset_token.to_string()));
    }

    async fn account_locked(&self, _email: &str, _locked_until: DateTime<Utc>) {}
}

fn default_rate_settings() -> RateLimitSettings {
    RateLimitSettings {
        window_secs: 60,
        login_max: 1000,
        register_max: 1000,
        refresh_max: 1000,
        oauth_max: 1000,
        password_reset_max: 1000,
    }
}

fn build_app(rate: RateLimitSettings) -> (Router, Arc<RecordingNotifier>) {
    let accounts = Arc::new(MemoryAccountStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
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
        notifier.clone(),
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
    let limiter = Arc::new(RateLimiter::new(Arc::new(MemoryRateWindows::new()), &rate));

    let app = app_router(AppState {
        auth,
        oauth,
        limiter,
        tokens,
    });
    (app, notifier)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn post_json_bearer(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn register(app: &Router, email: &str, password: &str) -> Value {
    let response = post_json(
        app,
        "/api/v1/auth/register",
        json!({ "email": email, "password": password, "acceptTerms": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

#[tokio::test]
async fn register_signs_in_and_sets_session_cookie() {
    let (app, _) = build_app(default_rate_settings());

    let response = post_json(
        &app,
        "/api/v1/auth/register",
        json!({
            "email": "alice@example.com",
            "password": "Secure!Pass123",
            "name": "Alice",
            "acceptTerms": true,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .expect("cookie str")
        .to_string();
    assert!(cookie.starts_with("session_id="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));

    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["name"], "Alice");
    assert!(body["user"].get("passwordHash").is_none());
    assert_eq!(body["tokens"]["tokenType"], "Bearer");
    assert!(!body["tokens"]["accessToken"].as_str().unwrap().is_empty());
    assert!(!body["tokens"]["refreshToken"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn login_returns_tokens_and_session() {
    let (app, _) = build_app(default_rate_settings());
    register(&app, "alice@example.com", "Secure!Pass123").await;

    let response = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "Alice@Example.com", "password": "Secure!Pass123" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(!body["accessToken"].as_str().unwrap().is_empty());
    assert!(!body["refreshToken"].as_str().unwrap().is_empty());
    assert!(body["expiresIn"].as_i64().unwrap() > 0);
    assert!(body["sessionId"].is_string());
}

#[tokio::test]
async fn unknown_account_and_wrong_password_are_indistinguishable() {
    let (app, _) = build_app(default_rate_settings());
    register(&app, "alice@example.com", "Secure!Pass123").await;

    let unknown = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "ghost@example.com", "password": "Secure!Pass123" }),
    )
    .await;
    let wrong = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "alice@example.com", "password": "Wrong!Pass123" }),
    )
    .await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(unknown).await, read_json(wrong).await);
}

#[tokio::test]
async fn fifth_failure_locks_the_account() {
    let (app, _) = build_app(default_rate_settings());
    register(&app, "alice@example.com", "Secure!Pass123").await;

    for _ in 0..4 {
        let response = post_json(
            &app,
            "/api/v1/auth/login",
            json!({ "email": "alice@example.com", "password": "Wrong!Pass123" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let fifth = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "alice@example.com", "password": "Wrong!Pass123" }),
    )
    .await;
    assert_eq!(fifth.status(), StatusCode::LOCKED);
    let body = read_json(fifth).await;
    assert_eq!(body["error"], "account_locked");
    assert!(body["lockedUntil"].as_str().unwrap().ends_with('Z'));

    // The right password is refused too while the lock holds
    let correct = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "alice@example.com", "password": "Secure!Pass123" }),
    )
    .await;
    assert_eq!(correct.status(), StatusCode::LOCKED);
}

#[tokio::test]
async fn rate_limited_login_returns_429_with_retry_after() {
    let mut rate = default_rate_settings();
    rate.login_max = 2;
    let (app, _) = build_app(rate);

    for _ in 0..2 {
        let response = post_json(
            &app,
            "/api/v1/auth/login",
            json!({ "email": "ghost@example.com", "password": "Secure!Pass123" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let limited = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "ghost@example.com", "password": "Secure!Pass123" }),
    )
    .await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = limited
        .headers()
        .get(header::RETRY_AFTER)
        .expect("Retry-After header")
        .to_str()
        .expect("header str")
        .parse()
        .expect("seconds");
    assert!(retry_after > 0 && retry_after <= 60);

    let body = read_json(limited).await;
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(body["retryAfter"].as_u64().unwrap(), retry_after);
}

#[tokio::test]
async fn refresh_returns_fresh_access_token() {
    let (app, _) = build_app(default_rate_settings());
    let registered = register(&app, "alice@example.com", "Secure!Pass123").await;
    let refresh_token = registered["tokens"]["refreshToken"].as_str().unwrap();

    let response = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": refresh_token }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(!body["accessToken"].as_str().unwrap().is_empty());
    // No rotation requested, no new refresh token
    assert!(body.get("refreshToken").is_none());
}

#[tokio::test]
async fn refresh_rotation_issues_new_refresh_token() {
    let (app, _) = build_app(default_rate_settings());
    let registered = register(&app, "alice@example.com", "Secure!Pass123").await;
    let refresh_token = registered["tokens"]["refreshToken"].as_str().unwrap();

    let response = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": refresh_token, "rotate": true }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let rotated = body["refreshToken"].as_str().expect("rotated token");
    assert!(!rotated.is_empty());
    assert_ne!(rotated, refresh_token);
}

#[tokio::test]
async fn refresh_rejects_an_access_token() {
    // An access token presented at the refresh endpoint must be refused
    let (app, _) = build_app(default_rate_settings());
    let registered = register(&app, "alice@example.com", "Secure!Pass123").await;
    let access_token = registered["tokens"]["accessToken"].as_str().unwrap();

    let response = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": access_token }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let (app, _) = build_app(default_rate_settings());
    let registered = register(&app, "alice@example.com", "Secure!Pass123").await;
    let refresh_token = registered["tokens"]["refreshToken"].as_str().unwrap();

    let response = post_json(
        &app,
        "/api/v1/auth/logout",
        json!({ "refreshToken": refresh_token }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("cleared cookie")
        .to_str()
        .expect("cookie str")
        .to_string();
    assert!(cookie.starts_with("session_id=;"));
    assert!(cookie.contains("Max-Age=0"));

    let body = read_json(response).await;
    assert_eq!(body["success"], true);

    // The refresh token died with its session
    let refused = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": refresh_token }),
    )
    .await;
    assert_eq!(refused.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(refused).await["error"], "session_expired");
}

#[tokio::test]
async fn revoke_all_requires_a_bearer_token() {
    let (app, _) = build_app(default_rate_settings());

    let response = post_json(&app, "/api/v1/auth/sessions/revoke-all", json!({})).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"], "invalid_token");
}

#[tokio::test]
async fn revoke_all_kills_every_session() {
    let (app, _) = build_app(default_rate_settings());
    let registered = register(&app, "alice@example.com", "Secure!Pass123").await;

    // A second device signs in
    let login = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "alice@example.com", "password": "Secure!Pass123" }),
    )
    .await;
    let login_body = read_json(login).await;
    let access_token = login_body["accessToken"].as_str().unwrap();

    let response = post_json_bearer(
        &app,
        "/api/v1/auth/sessions/revoke-all",
        access_token,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["revoked"].as_u64().unwrap(), 2);

    // Both refresh tokens are now dead
    for token in [
        registered["tokens"]["refreshToken"].as_str().unwrap(),
        login_body["refreshToken"].as_str().unwrap(),
    ] {
        let refused = post_json(
            &app,
            "/api/v1/auth/refresh",
            json!({ "refreshToken": token }),
        )
        .await;
        assert_eq!(refused.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn password_reset_round_trip() {
    let (app, notifier) = build_app(default_rate_settings());
    let registered = register(&app, "alice@example.com", "Secure!Pass123").await;
    let old_refresh = registered["tokens"]["refreshToken"].as_str().unwrap();

    let response = post_json(
        &app,
        "/api/v1/auth/password-reset/request",
        json!({ "email": "alice@example.com" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let reset_token = notifier.last_reset_token().expect("token delivered");

    let response = post_json(
        &app,
        "/api/v1/auth/password-reset/confirm",
        json!({ "token": reset_token, "newPassword": "Rotated!Pass456" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old password refused, new one works
    let old = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "alice@example.com", "password": "Secure!Pass123" }),
    )
    .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = post_json(
        &app,
        "/api/v1/auth/login",
        json!({ "email": "alice@example.com", "password": "Rotated!Pass456" }),
    )
    .await;
    assert_eq!(new.status(), StatusCode::OK);

    // Every session opened before the reset is gone
    let refused = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refreshToken": old_refresh }),
    )
    .await;
    assert_eq!(refused.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let (app, notifier) = build_app(default_rate_settings());
    register(&app, "alice@example.com", "Secure!Pass123").await;

    post_json(
        &app,
        "/api/v1/auth/password-reset/request",
        json!({ "email": "alice@example.com" }),
    )
    .await;
    let reset_token = notifier.last_reset_token().expect("token delivered");

    let first = post_json(
        &app,
        "/api/v1/auth/password-reset/confirm",
        json!({ "token": reset_token, "newPassword": "Rotated!Pass456" }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let replay = post_json(
        &app,
        "/api/v1/auth/password-reset/confirm",
        json!({ "token": reset_token, "newPassword": "Another!Pass789" }),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(replay).await["error"], "invalid_reset_token");
}

#[tokio::test]
async fn reset_request_for_unknown_email_still_succeeds() {
    let (app, notifier) = build_app(default_rate_settings());

    let response = post_json(
        &app,
        "/api/v1/auth/password-reset/request",
        json!({ "email": "ghost@example.com" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["success"], true);
    assert!(notifier.last_reset_token().is_none());
}

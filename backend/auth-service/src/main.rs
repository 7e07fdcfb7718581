/// Auth Service - Main entry point
/// REST API for credential and session security

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use auth_service::config::Settings;
use auth_service::rate_limit::RateLimiter;
use auth_service::security::LockoutGuard;
use auth_service::services::{
    AuthService, LogNotifier, OAuthFederator, SecurityNotifier, SessionManager,
};
use auth_service::store::{
    AccountStore, OAuthStateStore, PgAccountStore, PgSessionStore, RateWindowStore,
    RedisRateWindows, RedisStateStore, SessionStore,
};
use auth_service::{app_router, telemetry, AppState};
use token_core::TokenService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let settings = Settings::from_env()?;

    tracing::info!(
        "Starting auth service on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connection pool initialized");

    // Redis connection
    let redis_client = redis::Client::open(settings.redis.url.clone())?;
    let redis_conn = ConnectionManager::new(redis_client).await?;
    tracing::info!("Redis connection initialized");

    // Stores
    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));
    let session_store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
    let rate_windows: Arc<dyn RateWindowStore> = Arc::new(RedisRateWindows::new(redis_conn.clone()));
    let state_store: Arc<dyn OAuthStateStore> = Arc::new(RedisStateStore::new(redis_conn));

    // Services
    let tokens = Arc::new(TokenService::new(
        &settings.tokens.access_secret,
        &settings.tokens.refresh_secret,
        chrono::Duration::seconds(settings.tokens.access_ttl_secs),
        chrono::Duration::seconds(settings.tokens.refresh_ttl_secs),
    ));
    let sessions = SessionManager::new(session_store, &settings.sessions);
    let notifier: Arc<dyn SecurityNotifier> = Arc::new(LogNotifier);
    let auth = Arc::new(AuthService::new(
        accounts.clone(),
        sessions,
        tokens.clone(),
        LockoutGuard::from_settings(&settings.lockout),
        notifier,
        &settings.security,
    ));
    let oauth = Arc::new(OAuthFederator::new(
        accounts,
        state_store,
        &settings.oauth,
    ));
    let limiter = Arc::new(RateLimiter::new(rate_windows, &settings.rate_limit));

    let state = AppState {
        auth,
        oauth,
        limiter,
        tokens,
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("REST API listening on {}", addr);

    axum::serve(listener, app_router(state)).await?;

    Ok(())
}

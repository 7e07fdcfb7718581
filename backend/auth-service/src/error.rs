use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Session expired or revoked")]
    SessionExpired,

    #[error("Account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Email not verified")]
    EmailUnverified,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Invalid OAuth state")]
    InvalidOAuthState,

    #[error("Unknown OAuth provider: {0}")]
    InvalidOAuthProvider(String),

    #[error("OAuth provider supplied no email address")]
    OAuthEmailMissing,

    #[error("Account already linked to another {0} identity")]
    OAuthLinkConflict(String),

    #[error("OAuth provider error: {0}")]
    OAuthUpstream(String),

    #[error("Invalid password reset token")]
    InvalidResetToken,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_failed", msg.clone())
            }
            AuthError::WeakPassword(msg) => (
                StatusCode::BAD_REQUEST,
                "weak_password",
                format!("Password too weak: {}", msg),
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid email or password".to_string(),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid authentication token".to_string(),
            ),
            AuthError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "Authentication token has expired".to_string(),
            ),
            AuthError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "session_expired",
                "Session has expired or been revoked".to_string(),
            ),
            AuthError::AccountLocked { until } => (
                StatusCode::LOCKED,
                "account_locked",
                format!(
                    "Account temporarily locked until {}",
                    until.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            ),
            AuthError::AccountDisabled => (
                StatusCode::FORBIDDEN,
                "account_disabled",
                "Account is disabled".to_string(),
            ),
            AuthError::EmailUnverified => (
                StatusCode::FORBIDDEN,
                "email_unverified",
                "Email address has not been verified".to_string(),
            ),
            AuthError::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "email_exists",
                "Email already registered".to_string(),
            ),
            AuthError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                format!("Too many requests, retry in {} seconds", retry_after),
            ),
            AuthError::InvalidOAuthState => (
                StatusCode::FORBIDDEN,
                "invalid_oauth_state",
                "OAuth state is invalid, expired, or already used".to_string(),
            ),
            AuthError::InvalidOAuthProvider(name) => (
                StatusCode::BAD_REQUEST,
                "unknown_provider",
                format!("Unknown OAuth provider: {}", name),
            ),
            AuthError::OAuthEmailMissing => (
                StatusCode::BAD_REQUEST,
                "oauth_email_missing",
                "The provider did not supply an email address; grant email access and retry"
                    .to_string(),
            ),
            AuthError::OAuthLinkConflict(provider) => (
                StatusCode::CONFLICT,
                "oauth_link_conflict",
                format!("Account is already linked to another {} identity", provider),
            ),
            AuthError::InvalidResetToken => (
                StatusCode::BAD_REQUEST,
                "invalid_reset_token",
                "Password reset token is invalid or has expired".to_string(),
            ),
            // Internals stay generic on the wire; detail is already logged
            AuthError::OAuthUpstream(_)
            | AuthError::Database(_)
            | AuthError::Redis(_)
            | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        let mut body = json!({
            "error": code,
            "message": message,
        });
        match &self {
            AuthError::AccountLocked { until } => {
                body["lockedUntil"] = json!(until.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
            AuthError::RateLimited { retry_after } => {
                body["retryAfter"] = json!(retry_after);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if let AuthError::RateLimited { retry_after } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

// Conversions from external error types
impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        AuthError::Redis(err.to_string())
    }
}

impl From<token_core::TokenError> for AuthError {
    fn from(err: token_core::TokenError) -> Self {
        match err {
            token_core::TokenError::Expired => AuthError::TokenExpired,
            token_core::TokenError::Malformed
            | token_core::TokenError::SignatureInvalid
            | token_core::TokenError::WrongType => AuthError::InvalidToken,
            token_core::TokenError::Signing(msg) => {
                tracing::error!("Token signing error: {}", msg);
                AuthError::Internal(msg)
            }
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("OAuth upstream error: {}", err);
        AuthError::OAuthUpstream(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        AuthError::Internal(err.to_string())
    }
}

/// Credential authentication handlers
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use token_core::TokenPair;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::Result;
use crate::middleware::{extract_client_ip, user_agent, AuthenticatedAccount};
use crate::models::{
    LoginRequest, LogoutRequest, PublicAccount, RefreshRequest, RegisterRequest,
    RequestPasswordResetRequest, ResetPasswordRequest,
};
use crate::rate_limit::EndpointClass;
use crate::services::session_id_from_headers;
use crate::validators::normalize_email;
use crate::AppState;

/// Token pair as it goes over the wire
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairBody {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenPair> for TokenPairBody {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
        }
    }
}

/// Response for flows that end fully signed in (register, OAuth callback)
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthCompleteResponse {
    pub success: bool,
    pub user: PublicAccount,
    pub tokens: TokenPairBody,
}

/// Login response with tokens and the session backing them
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeAllResponse {
    pub success: bool,
    pub revoked: u64,
}

/// Uniform error body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn rate_key(headers: &HeaderMap) -> String {
    extract_client_ip(headers).unwrap_or_else(|| "unknown".to_string())
}

/// Register endpoint handler
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthCompleteResponse),
        (status = 400, description = "Invalid input or weak password", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    state
        .limiter
        .enforce(&rate_key(&headers), EndpointClass::Register)
        .await?;
    payload.validate()?;

    let login = state
        .auth
        .register(payload, extract_client_ip(&headers), user_agent(&headers))
        .await?;

    let cookie = state
        .auth
        .sessions()
        .session_cookie(&login.session, Utc::now())?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);

    Ok((
        StatusCode::CREATED,
        response_headers,
        Json(AuthCompleteResponse {
            success: true,
            user: PublicAccount::from(&login.account),
            tokens: login.tokens.into(),
        }),
    ))
}

/// Login endpoint handler
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 423, description = "Account locked", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    state
        .limiter
        .enforce(&rate_key(&headers), EndpointClass::Login)
        .await?;
    payload.validate()?;
    // A second window keyed by the target account blunts distributed
    // attacks that rotate source addresses
    state
        .limiter
        .enforce(&normalize_email(&payload.email), EndpointClass::Login)
        .await?;

    let login = state
        .auth
        .login(payload, extract_client_ip(&headers), user_agent(&headers))
        .await?;

    let cookie = state
        .auth
        .sessions()
        .session_cookie(&login.session, Utc::now())?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);

    Ok((
        StatusCode::OK,
        response_headers,
        Json(LoginResponse {
            access_token: login.tokens.access_token,
            refresh_token: login.tokens.refresh_token,
            expires_in: login.tokens.expires_in,
            session_id: login.session.id,
        }),
    ))
}

/// Token refresh endpoint handler
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh access token", body = RefreshResponse),
        (status = 401, description = "Invalid, expired or wrong-type token", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    state
        .limiter
        .enforce(&rate_key(&headers), EndpointClass::Refresh)
        .await?;
    payload.validate()?;

    let refreshed = state
        .auth
        .refresh(&payload.refresh_token, payload.rotate)
        .await?;

    Ok(Json(RefreshResponse {
        access_token: refreshed.access_token,
        refresh_token: refreshed.refresh_token,
        expires_in: refreshed.expires_in,
    }))
}

/// Logout endpoint handler. The session is named by the cookie or by the
/// refresh token in the body; either way the cookie is cleared.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session ended", body = SuccessResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse> {
    let cookie_session = session_id_from_headers(&headers);
    let refresh_token = payload.as_ref().and_then(|p| p.refresh_token.as_deref());
    state.auth.logout(cookie_session, refresh_token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, state.auth.sessions().cleared_session_cookie()?);

    Ok((
        StatusCode::OK,
        response_headers,
        Json(SuccessResponse { success: true }),
    ))
}

/// Revoke every session of the authenticated account
#[utoipa::path(
    post,
    path = "/api/v1/auth/sessions/revoke-all",
    tag = "Auth",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "All sessions revoked", body = RevokeAllResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    )
)]
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
    authed: AuthenticatedAccount,
) -> Result<Json<RevokeAllResponse>> {
    // A session cookie riding along is touched and its binding checked;
    // the bearer token alone decides access
    if let Some(session_id) = session_id_from_headers(&headers) {
        if let Ok(Some(session)) = state.auth.sessions().touch(session_id).await {
            state.auth.sessions().validate_binding(
                &session,
                extract_client_ip(&headers).as_deref(),
                user_agent(&headers).as_deref(),
            );
        }
    }

    let revoked = state.auth.revoke_all_sessions(authed.account_id).await?;
    Ok(Json(RevokeAllResponse {
        success: true,
        revoked,
    }))
}

/// Request a password reset. Always answers success so the endpoint does
/// not reveal which addresses hold accounts.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset/request",
    tag = "Auth",
    request_body = RequestPasswordResetRequest,
    responses(
        (status = 200, description = "Reset initiated if the account exists", body = SuccessResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RequestPasswordResetRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .limiter
        .enforce(&rate_key(&headers), EndpointClass::PasswordReset)
        .await?;
    payload.validate()?;

    state.auth.request_password_reset(payload).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Complete a password reset with the emailed token
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset/confirm",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = SuccessResponse),
        (status = 400, description = "Invalid or spent token, or weak password", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    state
        .limiter
        .enforce(&rate_key(&headers), EndpointClass::PasswordReset)
        .await?;
    payload.validate()?;

    state.auth.reset_password(payload).await?;
    Ok(Json(SuccessResponse { success: true }))
}

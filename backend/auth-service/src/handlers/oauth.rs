/// OAuth federation handlers
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use crate::error::{AuthError, Result};
use crate::handlers::auth::{AuthCompleteResponse, ErrorResponse};
use crate::middleware::{extract_client_ip, user_agent};
use crate::models::{
    AuthorizeQuery, AuthorizeResponse, CallbackQuery, OAuthProvider, PublicAccount,
};
use crate::rate_limit::EndpointClass;
use crate::AppState;

/// Start a federated login: park the state nonce and return the provider's
/// authorization URL for the frontend to redirect to.
#[utoipa::path(
    get,
    path = "/api/v1/oauth/authorize",
    tag = "Auth",
    params(
        ("provider" = String, Query, description = "Identity provider, google or github"),
        ("redirectUri" = String, Query, description = "Callback URL registered with the provider")
    ),
    responses(
        (status = 200, description = "Authorization URL and state nonce", body = AuthorizeResponse),
        (status = 400, description = "Unknown provider or bad redirect URI", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthorizeResponse>> {
    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    state.limiter.enforce(&ip, EndpointClass::OAuthAuthorize).await?;

    let provider = OAuthProvider::from_str(&query.provider)
        .ok_or_else(|| AuthError::InvalidOAuthProvider(query.provider.clone()))?;

    let (auth_url, state_nonce) = state.oauth.authorize(provider, &query.redirect_uri).await?;
    Ok(Json(AuthorizeResponse {
        auth_url,
        state: state_nonce,
    }))
}

/// Complete a federated login. Consumes the state nonce, exchanges the
/// code upstream, resolves the account, and signs it in.
#[utoipa::path(
    get,
    path = "/api/v1/oauth/callback",
    tag = "Auth",
    params(
        ("provider" = String, Query, description = "Identity provider, google or github"),
        ("code" = Option<String>, Query, description = "Authorization code from the provider"),
        ("state" = Option<String>, Query, description = "State nonce issued at authorize time"),
        ("redirectUri" = Option<String>, Query, description = "Callback URL the flow was started with")
    ),
    responses(
        (status = 200, description = "Signed in", body = AuthCompleteResponse),
        (status = 400, description = "Missing code or state, or no usable email", body = ErrorResponse),
        (status = 403, description = "Invalid, expired or replayed state", body = ErrorResponse),
        (status = 409, description = "Account already linked to another identity at this provider", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse> {
    let ip = extract_client_ip(&headers);
    state
        .limiter
        .enforce(ip.as_deref().unwrap_or("unknown"), EndpointClass::OAuthCallback)
        .await?;

    let (account, _created) = state.oauth.callback(&query).await?;
    let login = state
        .auth
        .establish_session(&account, ip, user_agent(&headers))
        .await?;

    let cookie = state
        .auth
        .sessions()
        .session_cookie(&login.session, Utc::now())?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);

    Ok((
        response_headers,
        Json(AuthCompleteResponse {
            success: true,
            user: PublicAccount::from(&login.account),
            tokens: login.tokens.into(),
        }),
    ))
}

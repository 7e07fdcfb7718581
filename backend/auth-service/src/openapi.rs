use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
/// OpenAPI document covering the REST endpoints exposed by auth-service
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

use crate::handlers::auth::{
    AuthCompleteResponse, ErrorResponse, LoginResponse, RefreshResponse, RevokeAllResponse,
    SuccessResponse, TokenPairBody,
};
use crate::models::account::{
    LoginRequest, LogoutRequest, PublicAccount, RefreshRequest, RegisterRequest,
    RequestPasswordResetRequest, ResetPasswordRequest,
};
use crate::models::oauth::AuthorizeResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::auth::revoke_all_sessions,
        crate::handlers::auth::request_password_reset,
        crate::handlers::auth::reset_password,
        crate::handlers::oauth::authorize,
        crate::handlers::oauth::callback
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        RefreshRequest,
        LogoutRequest,
        RequestPasswordResetRequest,
        ResetPasswordRequest,
        PublicAccount,
        TokenPairBody,
        AuthCompleteResponse,
        LoginResponse,
        RefreshResponse,
        SuccessResponse,
        RevokeAllResponse,
        AuthorizeResponse,
        ErrorResponse
    )),
    tags(
        (name = "Auth", description = "Authentication & token APIs")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

/// Swagger UI routes serving the generated document.
pub fn swagger_routes() -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
}

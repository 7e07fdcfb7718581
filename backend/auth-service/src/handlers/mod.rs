/// HTTP request handlers (REST API)
pub mod auth;
pub mod oauth;

// Re-export handlers for easy access
pub use auth::{
    login, logout, refresh, register, request_password_reset, reset_password,
    revoke_all_sessions, AuthCompleteResponse, ErrorResponse, LoginResponse, RefreshResponse,
    RevokeAllResponse, SuccessResponse, TokenPairBody,
};
pub use oauth::{authorize, callback};

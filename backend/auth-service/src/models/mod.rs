/// Data models for authentication
pub mod account;
pub mod oauth;
pub mod session;

pub use account::{
    Account, LoginRequest, LogoutRequest, PasswordResetToken, PublicAccount, RefreshRequest,
    RegisterRequest, RequestPasswordResetRequest, ResetPasswordRequest,
};
pub use oauth::{
    AuthorizeQuery, AuthorizeResponse, CallbackQuery, FederatedIdentity, NormalizedProfile,
    OAuthLink, OAuthProvider, ProviderTokens, StateRecord,
};
pub use session::Session;

/// Business logic services
pub mod auth;
pub mod notify;
pub mod oauth;
pub mod sessions;

pub use auth::{AuthService, AuthenticatedLogin, RefreshedTokens};
pub use notify::{LogNotifier, SecurityNotifier};
pub use oauth::{GitHubClient, GoogleClient, OAuthFederator, ProviderClient};
pub use sessions::{session_id_from_headers, BindingCheck, SessionManager, SESSION_COOKIE_NAME};

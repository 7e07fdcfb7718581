pub mod auth;

pub use auth::{bearer_token, extract_client_ip, user_agent, AuthenticatedAccount};

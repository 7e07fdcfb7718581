/// Security module for authentication
/// Provides password hashing and the brute-force lockout guard
pub mod lockout;
pub mod password;

pub use lockout::LockoutGuard;
pub use password::{hash_password, verify_decoy, verify_password};

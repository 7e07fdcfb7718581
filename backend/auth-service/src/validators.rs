use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// Input validation utilities for the auth service

// Compile regex patterns once at startup
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    // This regex is hardcoded and validated - it is a compile-time constant in practice
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

/// Validate email format (RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Lowercase and trim an email address so lookups and uniqueness are
/// case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate password strength requirements
/// - Minimum 8 characters
/// - At least one uppercase letter
/// - At least one lowercase letter
/// - At least one digit
/// - At least one special character
pub fn validate_password(password: &str) -> bool {
    password_policy_failure(password).is_none()
}

/// The first policy rule a candidate password fails, if any.
pub fn password_policy_failure(password: &str) -> Option<&'static str> {
    if password.len() < 8 {
        return Some("must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Some("must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Some("must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("must contain a digit");
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Some("must contain a special character");
    }
    None
}

/// validator crate compatible custom validator for email shape
pub fn validate_email_shape(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

/// validator crate compatible custom validator for password strength
pub fn validate_password_shape(password: &str) -> Result<(), ValidationError> {
    if validate_password(password) {
        Ok(())
    } else {
        Err(ValidationError::new("weak_password"))
    }
}

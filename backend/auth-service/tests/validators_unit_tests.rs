/// Unit tests for auth-service input validators
///
/// This test module covers:
/// - Email format validation
/// - Email normalization
/// - Password strength requirements
/// - Edge cases and boundary conditions

use auth_service::validators::{
    normalize_email, password_policy_failure, validate_email, validate_password,
};

// ============================================================================
// Email Validation Tests
// ============================================================================

#[test]
fn test_valid_email_formats() {
    assert!(validate_email("user@example.com"));
    assert!(validate_email("test.user@example.com"));
    assert!(validate_email("user+tag@example.co.uk"));
    assert!(validate_email("user_name@sub.domain.com"));
    assert!(validate_email("a@b.co"));
    assert!(validate_email("test123@example.com"));
}

#[test]
fn test_invalid_email_missing_at() {
    assert!(!validate_email("userexample.com"));
}

#[test]
fn test_invalid_email_missing_domain() {
    assert!(!validate_email("user@"));
}

#[test]
fn test_invalid_email_missing_local_part() {
    assert!(!validate_email("@example.com"));
}

#[test]
fn test_invalid_email_missing_tld() {
    assert!(!validate_email("user@example"));
}

#[test]
fn test_invalid_email_multiple_at_signs() {
    assert!(!validate_email("user@domain@example.com"));
}

#[test]
fn test_invalid_email_empty_string() {
    assert!(!validate_email(""));
}

#[test]
fn test_invalid_email_spaces() {
    assert!(!validate_email("user @example.com"));
    assert!(!validate_email("user@ example.com"));
}

#[test]
fn test_valid_email_max_length() {
    // RFC 5321: email addresses can be up to 254 characters
    let long_email = format!("{}@example.com", "a".repeat(240));
    assert!(validate_email(&long_email));
}

#[test]
fn test_invalid_email_exceeds_max_length() {
    // Email longer than 254 characters should fail
    let too_long_email = format!("{}@example.com", "a".repeat(250));
    assert!(!validate_email(&too_long_email));
}

// ============================================================================
// Email Normalization Tests
// ============================================================================

#[test]
fn test_normalize_lowercases_and_trims() {
    assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    assert_eq!(normalize_email("BOB@EXAMPLE.COM"), "bob@example.com");
}

#[test]
fn test_normalize_is_idempotent() {
    let once = normalize_email("Carol@Example.com");
    assert_eq!(normalize_email(&once), once);
}

// ============================================================================
// Password Strength Tests
// ============================================================================

#[test]
fn test_valid_password_all_requirements_met() {
    assert!(validate_password("SecurePass123!"));
    assert!(validate_password("MyP@ssw0rd"));
    assert!(validate_password("T3st#Pass"));
}

#[test]
fn test_invalid_password_too_short() {
    assert!(!validate_password("Short1!")); // 7 chars
}

#[test]
fn test_invalid_password_no_uppercase() {
    assert!(!validate_password("securepass123!"));
}

#[test]
fn test_invalid_password_no_lowercase() {
    assert!(!validate_password("SECUREPASS123!"));
}

#[test]
fn test_invalid_password_no_digit() {
    assert!(!validate_password("SecurePass!"));
}

#[test]
fn test_invalid_password_no_special_character() {
    assert!(!validate_password("SecurePassword1"));
}

#[test]
fn test_valid_password_with_various_special_chars() {
    assert!(validate_password("Pass1!word"));
    assert!(validate_password("Pass1@word"));
    assert!(validate_password("Pass1#word"));
    assert!(validate_password("Pass1$word"));
    assert!(validate_password("Pass1%word"));
    assert!(validate_password("Pass1&word"));
    assert!(validate_password("Pass1*word"));
    assert!(validate_password("Pass1-word"));
    assert!(validate_password("Pass1_word"));
}

#[test]
fn test_valid_password_exactly_8_chars() {
    // Exactly 8 characters with all requirements met
    assert!(validate_password("Pass1!ab"));
}

#[test]
fn test_valid_password_long() {
    assert!(validate_password("VeryLongSecurePassword123!@#"));
}

#[test]
fn test_invalid_password_empty() {
    assert!(!validate_password(""));
}

// ============================================================================
// Policy Failure Reason Tests
// ============================================================================

#[test]
fn test_policy_failure_reports_first_broken_rule() {
    assert_eq!(
        password_policy_failure("Sh0rt!"),
        Some("must be at least 8 characters")
    );
    assert_eq!(
        password_policy_failure("nouppercase1!"),
        Some("must contain an uppercase letter")
    );
    assert_eq!(
        password_policy_failure("NOLOWERCASE1!"),
        Some("must contain a lowercase letter")
    );
    assert_eq!(
        password_policy_failure("NoDigitsHere!"),
        Some("must contain a digit")
    );
    assert_eq!(
        password_policy_failure("NoSpecials123"),
        Some("must contain a special character")
    );
}

#[test]
fn test_policy_failure_none_for_conforming_password() {
    assert_eq!(password_policy_failure("Secure!Pass123"), None);
}

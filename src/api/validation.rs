//! Input validation for auth requests.
//!
//! Handlers trim inputs before calling in here; the functions only judge shape.

use lazy_static::lazy_static;
use regex::Regex;

/// Passwords shorter than this are refused at sign-up
pub const MIN_PASSWORD_LEN: usize = 12;

lazy_static! {
    /// Local part, `@`, then a dotted domain with an alphabetic TLD
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$"
    ).unwrap();
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if !EMAIL_REGEX.is_match(email) {
        return Err("incorrect email".to_string());
    }
    Ok(())
}

/// Check a sign-up/sign-in pair: both present, a long enough password and a
/// well-formed email, reported in that order.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), String> {
    if email.is_empty() || password.is_empty() {
        return Err("all fields must be completed".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be more than {} characters",
            MIN_PASSWORD_LEN - 1
        ));
    }

    validate_email(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_credentials() {
        assert!(validate_credentials("a@x.com", "qwerty123456").is_ok());
        assert!(
            validate_credentials("first.last+tag@sub.example.org", "a very long passphrase").is_ok()
        );
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            validate_credentials("", "qwerty123456").unwrap_err(),
            "all fields must be completed"
        );
        assert_eq!(
            validate_credentials("a@x.com", "").unwrap_err(),
            "all fields must be completed"
        );
    }

    #[test]
    fn test_short_password() {
        assert_eq!(
            validate_credentials("a@x.com", "qwerty12345").unwrap_err(),
            "password must be more than 11 characters"
        );
    }

    #[test]
    fn test_invalid_emails() {
        for email in ["plainaddress", "a@x", "@x.com", "a@@x.com", "a b@x.com"] {
            assert_eq!(
                validate_credentials(email, "qwerty123456").unwrap_err(),
                "incorrect email",
                "{email} should be rejected"
            );
        }
    }
}

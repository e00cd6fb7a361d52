use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Characters that satisfy the "special character" password rule
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Lazy-loaded email validation regex
///
/// This regex validates email addresses according to a practical subset of RFC 5322.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Validates an email address
///
/// Expects an already normalized address.
///
/// # Examples
///
/// ```rust
/// use warden_core::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("invalid-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "email".to_string(),
        ));
    }

    if email.len() > 254 {
        return Err(ValidationError::InvalidEmail(
            "too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(
            "unrecognized format".to_string(),
        ))
    }
}

/// Validates a password according to the registration strength rules
///
/// # Password Requirements
///
/// - Between 8 and 128 characters
/// - At least one uppercase letter
/// - At least one lowercase letter
/// - At least one digit
/// - At least one special character from [`PASSWORD_SPECIAL_CHARS`]
///
/// These rules only apply when a password is set. Login never validates the
/// password shape, so a weak guess still counts as a failed attempt.
///
/// # Examples
///
/// ```rust
/// use warden_core::validation::validate_password;
///
/// assert!(validate_password("Secure#Pass1").is_ok());
/// assert!(validate_password("weak").is_err());
/// ```
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "password".to_string(),
        ));
    }

    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "must be no more than {MAX_PASSWORD_LENGTH} characters long"
        )));
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(ValidationError::InvalidPassword(
            "must contain at least one uppercase letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(ValidationError::InvalidPassword(
            "must contain at least one lowercase letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidPassword(
            "must contain at least one digit".to_string(),
        ));
    }

    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(ValidationError::InvalidPassword(
            "must contain at least one special character".to_string(),
        ));
    }

    Ok(())
}

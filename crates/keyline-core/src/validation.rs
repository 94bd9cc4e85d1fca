//! Client-side form validation.
//!
//! Rules run in a fixed order and the first failure wins, so a form only ever
//! shows one message at a time. Nothing here touches the network.

use std::sync::LazyLock;

use regex::Regex;

const MIN_PASSWORD_CHARS: usize = 6;
const MIN_NAME_CHARS: usize = 2;

/// Common mobile-platform email shape: `local@label(.label)+`.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$",
    )
    .expect("email pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("First name is required")]
    FirstNameRequired,
    #[error("First name must be at least 2 characters")]
    FirstNameTooShort,
    #[error("Last name is required")]
    LastNameRequired,
    #[error("Last name must be at least 2 characters")]
    LastNameTooShort,
    #[error("Email is required")]
    EmailRequired,
    #[error("Please enter a valid email address")]
    EmailInvalid,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Registration form as typed by the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationForm<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Validates login input. `email` is expected to be trimmed already.
///
/// # Errors
/// Returns the first rule that fails.
pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    validate_password(password)
}

/// Validates a registration form. Names and email are trimmed before checking.
///
/// # Errors
/// Returns the first rule that fails.
pub fn validate_registration(form: &RegistrationForm<'_>) -> Result<(), ValidationError> {
    validate_name(
        form.first_name.trim(),
        ValidationError::FirstNameRequired,
        ValidationError::FirstNameTooShort,
    )?;
    validate_name(
        form.last_name.trim(),
        ValidationError::LastNameRequired,
        ValidationError::LastNameTooShort,
    )?;
    validate_email(form.email.trim())?;
    validate_password(form.password)?;
    if form.password != form.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

fn validate_name(
    name: &str,
    required: ValidationError,
    too_short: ValidationError,
) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(required);
    }
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(too_short);
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    if !is_valid_email(email) {
        return Err(ValidationError::EmailInvalid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

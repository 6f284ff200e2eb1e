//! Purpose: Client-side form checks applied before a request is built.
//! Exports: `normalize_username`, `require_username`, `parse_code`, `validate_email`,
//!   `validate_age`, `validate_rating`, `require_non_empty`.
//! Role: Rejects obviously bad input locally with `Usage` errors.
//! Invariants: Error messages are short, user-facing, and name the offending field.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 100;

/// Lowercases and replaces spaces with `_`, as usernames are typed.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

pub fn require_username(raw: &str) -> Result<String, Error> {
    let username = normalize_username(raw);
    if username.is_empty() {
        return Err(usage("Username cannot be empty"));
    }
    Ok(username)
}

pub fn require_non_empty(field: &str, raw: &str) -> Result<String, Error> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(usage(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Access codes are exactly six digits without a leading zero.
pub fn parse_code(raw: &str) -> Result<u32, Error> {
    let raw = raw.trim();
    let invalid = || {
        usage("Code must be a 6-digit number").with_hint("Use a code between 100000 and 999999.")
    };
    if raw.len() != 6 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    let code: u32 = raw.parse().map_err(|_| invalid())?;
    if !(100_000..=999_999).contains(&code) {
        return Err(invalid());
    }
    Ok(code)
}

pub fn validate_email(raw: &str) -> Result<String, Error> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(usage("Email cannot be empty"));
    }
    if !looks_like_email(email) {
        return Err(usage("Invalid email format"));
    }
    Ok(email.to_string())
}

pub fn validate_age(age: u32) -> Result<u32, Error> {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(usage(format!(
            "The minimum age is {MIN_AGE} and the maximum age is {MAX_AGE}"
        )));
    }
    Ok(age)
}

pub fn validate_rating(rating: u8) -> Result<u8, Error> {
    if !(1..=5).contains(&rating) {
        return Err(usage("Rating must be between 1 and 5"));
    }
    Ok(rating)
}

// local@domain.tld, no whitespace, one '@', a dot inside the domain.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty()
        && !host.starts_with('.')
        && !tld.is_empty()
        && tld.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

fn usage(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Usage).with_message(message)
}

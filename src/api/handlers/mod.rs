//! API handlers and shared validation helpers.

pub mod auth;
pub mod health;
pub mod records;

use regex::Regex;

/// Lightweight email sanity check used by auth handlers before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

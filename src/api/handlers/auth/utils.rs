//! Small helpers shared by the auth handlers.

use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::error::AuthError;

const TOKEN_BYTES: usize = 32;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create a new opaque token. 256 bits from the OS RNG, URL-safe base64.
pub(crate) fn generate_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| AuthError::TokenGeneration(err.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

pub(crate) fn unix_now() -> Result<u64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|err| AuthError::TokenGeneration(format!("system clock: {err}")))
}

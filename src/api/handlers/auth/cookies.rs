//! Cookie and header transport for tokens.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
};

use super::{state::AuthConfig, token::SessionToken};
use crate::api::error::AuthError;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const LOGGED_IN_COOKIE: &str = "logged_in";

const EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

fn cookie(
    name: &str,
    value: &str,
    max_age: u64,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue, AuthError> {
    let mut cookie = format!("{name}={value}; Path=/");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie.push_str(&format!("; SameSite=Lax; Max-Age={max_age}"));
    if max_age == 0 {
        cookie.push_str(&format!("; Expires={EPOCH}"));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// `access_token` (`HttpOnly`) and the script-readable `logged_in` flag, both
/// living as long as the access token.
pub(super) fn access_cookies(
    config: &AuthConfig,
    access: &SessionToken,
) -> Result<Vec<HeaderValue>, AuthError> {
    let max_age = config.access_max_age_seconds();
    Ok(vec![
        cookie(
            ACCESS_COOKIE,
            &access.token_id,
            max_age,
            true,
            config.cookie_secure(),
        )?,
        cookie(LOGGED_IN_COOKIE, "true", max_age, false, config.cookie_secure())?,
    ])
}

pub(super) fn refresh_cookie(
    config: &AuthConfig,
    refresh: &SessionToken,
) -> Result<HeaderValue, AuthError> {
    cookie(
        REFRESH_COOKIE,
        &refresh.token_id,
        config.refresh_max_age_seconds(),
        true,
        config.cookie_secure(),
    )
}

/// All three cookies, already expired.
pub(super) fn cleared_cookies(config: &AuthConfig) -> Result<Vec<HeaderValue>, AuthError> {
    let secure = config.cookie_secure();
    Ok(vec![
        cookie(ACCESS_COOKIE, "", 0, true, secure)?,
        cookie(REFRESH_COOKIE, "", 0, true, secure)?,
        cookie(LOGGED_IN_COOKIE, "", 0, false, secure)?,
    ])
}

pub(super) fn set_cookie_headers(cookies: Vec<HeaderValue>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        headers.append(SET_COOKIE, cookie);
    }
    headers
}

/// Read a cookie by name across every `Cookie` header. Empty values count as absent.
pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// The access token presented with a request. A bearer header wins over the cookie.
pub(crate) fn presented_access_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| read_cookie(headers, ACCESS_COOKIE))
}

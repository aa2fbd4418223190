use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    cookies::{REFRESH_COOKIE, cleared_cookies, read_cookie, set_cookie_headers},
    session::Principal,
    state::AuthState,
    types::Revoked,
};
use crate::api::envelope::Envelope;

#[utoipa::path(
    get,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Both tokens revoked; all auth cookies expired"),
        (status = 401, description = "Not authenticated or no refresh token cookie"),
        (status = 403, description = "Access token is invalid or expired")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    auth_state: Extension<Arc<AuthState>>,
    principal: Option<Extension<Principal>>,
    headers: HeaderMap,
) -> Response {
    let refresh_token = read_cookie(&headers, REFRESH_COOKIE);
    let principal = principal.map(|Extension(principal)| principal);

    if let Err(err) = auth_state
        .logout(principal.as_ref(), refresh_token.as_deref())
        .await
    {
        return err.into_response();
    }

    match cleared_cookies(auth_state.config()) {
        Ok(cookies) => (StatusCode::OK, set_cookie_headers(cookies)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout-all",
    responses(
        (status = 200, description = "Every session of the user revoked", body = Envelope<Revoked>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Access token is invalid or expired")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout_all(
    auth_state: Extension<Arc<AuthState>>,
    principal: Extension<Principal>,
) -> Response {
    let revoked = match auth_state.logout_all(&principal).await {
        Ok(revoked) => revoked,
        Err(err) => return err.into_response(),
    };

    match cleared_cookies(auth_state.config()) {
        Ok(cookies) => (
            StatusCode::OK,
            set_cookie_headers(cookies),
            Json(Envelope::data(Revoked { revoked })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

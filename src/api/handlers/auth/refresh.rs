use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    cookies::{REFRESH_COOKIE, access_cookies, read_cookie, set_cookie_headers},
    state::AuthState,
};
use crate::api::envelope::{Envelope, TokenGrant};

#[utoipa::path(
    get,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New access token; resets access_token and logged_in cookies", body = TokenGrant),
        (status = 401, description = "No refresh token cookie"),
        (status = 403, description = "Refresh token is invalid or expired")
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, headers))]
pub async fn refresh(auth_state: Extension<Arc<AuthState>>, headers: HeaderMap) -> Response {
    let refresh_token = read_cookie(&headers, REFRESH_COOKIE);

    let refreshed = match auth_state.refresh(refresh_token.as_deref()).await {
        Ok(refreshed) => refreshed,
        Err(err) => return err.into_response(),
    };

    let cookies = match access_cookies(auth_state.config(), &refreshed.access) {
        Ok(cookies) => cookies,
        Err(err) => return err.into_response(),
    };

    let body = Envelope::<()>::tokens(refreshed.access.token_id, None);
    (StatusCode::OK, set_cookie_headers(cookies), Json(body)).into_response()
}

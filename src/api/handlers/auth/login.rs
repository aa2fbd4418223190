use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::instrument;

use super::{
    cookies::{access_cookies, refresh_cookie, set_cookie_headers},
    state::AuthState,
    types::SignInRequest,
};
use crate::api::{
    envelope::{Envelope, TokenGrant},
    error::AuthError,
};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in; sets access_token, refresh_token and logged_in cookies", body = TokenGrant),
        (status = 400, description = "Invalid email or password"),
        (status = 422, description = "Malformed request body")
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignInRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::Validation("missing or malformed JSON body".to_string()).into_response();
    };

    let signed_in = match auth_state
        .sign_in(&request.email, SecretString::from(request.password))
        .await
    {
        Ok(signed_in) => signed_in,
        Err(err) => return err.into_response(),
    };

    let config = auth_state.config();
    let cookies = match access_cookies(config, &signed_in.access).and_then(|mut cookies| {
        cookies.push(refresh_cookie(config, &signed_in.refresh)?);
        Ok(cookies)
    }) {
        Ok(cookies) => cookies,
        Err(err) => return err.into_response(),
    };

    let body = Envelope::<()>::tokens(signed_in.access.token_id, Some(signed_in.user));
    (StatusCode::OK, set_cookie_headers(cookies), Json(body)).into_response()
}

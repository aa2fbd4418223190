use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::instrument;

use super::{state::AuthState, types::SignUpRequest};
use crate::{
    api::{envelope::Envelope, error::AuthError},
    identity::User,
};

#[utoipa::path(
    post,
    path = "/api/auth/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = Envelope<User>),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Malformed request body")
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn sign_up(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignUpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::Validation("missing or malformed JSON body".to_string()).into_response();
    };

    match auth_state
        .sign_up(
            &request.email,
            SecretString::from(request.password),
            request.display_name,
        )
        .await
    {
        Ok(user) => (StatusCode::CREATED, Json(Envelope::data(user))).into_response(),
        Err(err) => err.into_response(),
    }
}

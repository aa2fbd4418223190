use axum::{Json, extract::Extension, response::IntoResponse};

use super::session::Principal;
use crate::{api::envelope::Envelope, identity::User};

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = Envelope<User>),
        (status = 401, description = "No access token"),
        (status = 403, description = "Access token is invalid or expired")
    ),
    tag = "auth"
)]
pub async fn me(principal: Extension<Principal>) -> impl IntoResponse {
    Json(Envelope::data(principal.0.user))
}

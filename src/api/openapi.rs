#![allow(clippy::needless_for_each)]

use utoipa::OpenApi;

use super::envelope::TokenGrant;
use super::handlers::{
    auth::{
        login::__path_login,
        logout::{__path_logout, __path_logout_all},
        me::__path_me,
        refresh::__path_refresh,
        signup::__path_sign_up,
        types::{Revoked, SignInRequest, SignUpRequest},
    },
    health::{self, __path_health},
};
use crate::identity::User;

#[derive(OpenApi)]
#[openapi(
    paths(health, sign_up, login, refresh, logout, logout_all, me),
    components(schemas(
        health::Health,
        SignUpRequest,
        SignInRequest,
        Revoked,
        TokenGrant,
        User
    )),
    tags(
        (name = "auth", description = "Sign-up, sign-in, token refresh and logout"),
        (name = "health", description = "Dependency health")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

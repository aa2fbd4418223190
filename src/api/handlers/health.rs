use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use super::auth::AuthState;
use crate::GIT_COMMIT_HASH;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
    session_store: String,
}

const fn status_str(healthy: bool) -> &'static str {
    if healthy { "ok" } else { "error" }
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database and session store are healthy", body = [Health]),
        (status = 503, description = "Database or session store is unhealthy", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let database = auth_state.users().ping().await;
    if let Err(err) = &database {
        error!("Failed to ping database: {err}");
    }

    let session_store = auth_state.sessions().ping().await;
    if let Err(err) = &session_store {
        error!("Failed to ping session store: {err}");
    }

    let is_healthy = database.is_ok() && session_store.is_ok();

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: status_str(database.is_ok()).to_string(),
        session_store: status_str(session_store.is_ok()).to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = health.commit.get(..7).unwrap_or("");

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .unwrap_or_else(|err| {
            error!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    if is_healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

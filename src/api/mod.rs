use crate::{
    api::handlers::{
        auth::{self, AuthConfig, AuthState},
        health, records,
    },
    identity::PgUserStore,
    records::{PgArticleStore, RecordStore},
    store::RedisSessionStore,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod envelope;
pub mod error;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Connection and runtime settings for [`new`].
#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: SecretString,
    pub redis_url: SecretString,
    pub request_timeout: Duration,
}

/// Build the application router.
///
/// Auth routes, the auth-gated record routes for `records`, `/health`, and
/// the Swagger UI. Request ids and the HTTP trace span are applied here; the
/// whole-request timeout is left to the caller.
pub fn router<R: RecordStore>(auth_state: Arc<AuthState>, records: Arc<R>) -> Router {
    let gate = middleware::from_fn_with_state(auth_state.clone(), auth::require_auth);

    let protected = Router::new()
        .route("/api/auth/logout", get(auth::logout::logout))
        .route("/api/auth/logout-all", post(auth::logout::logout_all))
        .route("/api/auth/me", get(auth::me::me))
        .route("/api/add", post(records::create::<R>))
        .route("/api/edit/:id", post(records::update::<R>))
        .route("/api/list", get(records::list::<R>))
        .route_layer(gate);

    Router::new()
        .route("/api/auth/sign-up", post(auth::signup::sign_up))
        .route("/api/auth/login", post(auth::login::login))
        .route("/api/auth/refresh", get(auth::refresh::refresh))
        .merge(protected)
        .route(
            "/health",
            get(health::health)
                .head(health::health)
                .options(health::health),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state))
                .layer(Extension(records)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to connect a store or to start the server
pub async fn new(server: ServerConfig, auth_config: AuthConfig) -> Result<()> {
    let store_timeout = auth_config.store_timeout();

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(store_timeout)
        .test_before_acquire(true)
        .connect(server.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let sessions = RedisSessionStore::connect(
        server.redis_url.expose_secret(),
        store_timeout,
        auth_config.refresh_ttl(),
    )
    .await?;

    let users = PgUserStore::new(pool.clone(), store_timeout);
    let articles = PgArticleStore::new(pool, store_timeout);

    let auth_state = Arc::new(AuthState::new(
        auth_config,
        Arc::new(sessions),
        Arc::new(users),
    ));

    let app = router(auth_state, Arc::new(articles))
        .layer(TimeoutLayer::new(server.request_timeout));

    let listener = TcpListener::bind(format!("::0:{}", server.port)).await?;

    info!("Listening on [::]:{}", server.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

use crate::{
    api::{self, ServerConfig, handlers::auth::AuthConfig},
    cli::telemetry,
};
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub redis_url: SecretString,
    pub store_timeout: Duration,
    pub access_token_maxage: u64,
    pub refresh_token_maxage: u64,
    pub cookie_secure: bool,
    pub request_timeout: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the token max ages are invalid, a store cannot be
/// reached, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.access_token_maxage, args.refresh_token_maxage)?
        .with_cookie_secure(args.cookie_secure)
        .with_store_timeout(args.store_timeout);

    debug!(
        access_ttl = ?auth_config.access_ttl(),
        refresh_ttl = ?auth_config.refresh_ttl(),
        store_timeout = ?auth_config.store_timeout(),
        "auth configuration loaded"
    );

    let server = ServerConfig {
        port: args.port,
        dsn: args.dsn,
        redis_url: args.redis_url,
        request_timeout: args.request_timeout,
    };

    let result = api::new(server, auth_config).await;

    telemetry::shutdown_tracer();

    result
}

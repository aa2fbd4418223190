//! Map parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{session, storage};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let storage_opts = storage::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: storage_opts.dsn,
        redis_url: storage_opts.redis_url,
        store_timeout: storage_opts.timeout,
        access_token_maxage: session_opts.access_token_maxage,
        refresh_token_maxage: session_opts.refresh_token_maxage,
        cookie_secure: session_opts.cookie_secure,
        request_timeout: session_opts.request_timeout,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    fn vars(dsn: &'static str) -> [(&'static str, Option<&'static str>); 6] {
        [
            ("GATEHOUSE_DSN", Some(dsn)),
            ("GATEHOUSE_REDIS_URL", Some("redis://127.0.0.1:6379/0")),
            ("GATEHOUSE_ACCESS_TOKEN_MAXAGE", Some("15")),
            ("GATEHOUSE_REFRESH_TOKEN_MAXAGE", Some("60")),
            ("GATEHOUSE_STORE_TIMEOUT_MS", Some("500")),
            ("GATEHOUSE_PORT", None),
        ]
    }

    #[test]
    fn builds_server_action() {
        temp_env::with_vars(vars("postgres://user@localhost:5432/gatehouse"), || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["gatehouse"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.port, 8080);
                assert_eq!(args.access_token_maxage, 15);
                assert_eq!(args.refresh_token_maxage, 60);
                assert_eq!(args.store_timeout, Duration::from_millis(500));
                assert_eq!(args.redis_url.expose_secret(), "redis://127.0.0.1:6379/0");
                assert!(!args.cookie_secure);
            }
        });
    }

    #[test]
    fn rejects_wrong_dsn_scheme() {
        temp_env::with_vars(vars("mysql://user@localhost/gatehouse"), || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["gatehouse"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("unsupported scheme 'mysql' for --dsn"));
                assert!(!err.to_string().contains("user@localhost"));
            }
        });
    }
}

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_ACCESS_TOKEN_MAXAGE: &str = "access-token-maxage";
pub const ARG_REFRESH_TOKEN_MAXAGE: &str = "refresh-token-maxage";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_REQUEST_TIMEOUT_SECONDS: &str = "request-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub access_token_maxage: u64,
    pub refresh_token_maxage: u64,
    pub cookie_secure: bool,
    pub request_timeout: Duration,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required max age is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read_minutes = |id: &str| -> Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .with_context(|| format!("missing required argument: --{id}"))
        };
        let request_timeout = matches
            .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
            .copied()
            .context("missing required argument: --request-timeout-seconds")?;

        Ok(Self {
            access_token_maxage: read_minutes(ARG_ACCESS_TOKEN_MAXAGE)?,
            refresh_token_maxage: read_minutes(ARG_REFRESH_TOKEN_MAXAGE)?,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            request_timeout: Duration::from_secs(request_timeout),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_MAXAGE)
                .long(ARG_ACCESS_TOKEN_MAXAGE)
                .help("Access token lifetime in minutes")
                .env("GATEHOUSE_ACCESS_TOKEN_MAXAGE")
                .required(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_MAXAGE)
                .long(ARG_REFRESH_TOKEN_MAXAGE)
                .help("Refresh token lifetime in minutes")
                .env("GATEHOUSE_REFRESH_TOKEN_MAXAGE")
                .required(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark auth cookies Secure (serve over HTTPS)")
                .env("GATEHOUSE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_SECONDS)
                .long(ARG_REQUEST_TIMEOUT_SECONDS)
                .help("Upper bound for a whole request, in seconds")
                .env("GATEHOUSE_REQUEST_TIMEOUT_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

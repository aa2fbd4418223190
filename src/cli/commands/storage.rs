use anyhow::{Context, Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

pub const ARG_DSN: &str = "dsn";
pub const ARG_REDIS_URL: &str = "redis-url";
pub const ARG_STORE_TIMEOUT_MS: &str = "store-timeout-ms";

#[derive(Debug)]
pub struct Options {
    pub dsn: SecretString,
    pub redis_url: SecretString,
    pub timeout: Duration,
}

impl Options {
    /// Parse storage arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a URL is missing, unparsable, or has the wrong scheme.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let dsn = read_url(matches, ARG_DSN, &["postgres", "postgresql"])?;
        let redis_url = read_url(matches, ARG_REDIS_URL, &["redis", "rediss", "redis+unix"])?;
        let timeout_ms = matches
            .get_one::<u64>(ARG_STORE_TIMEOUT_MS)
            .copied()
            .context("missing required argument: --store-timeout-ms")?;

        Ok(Self {
            dsn: SecretString::from(dsn),
            redis_url: SecretString::from(redis_url),
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn read_url(matches: &ArgMatches, id: &str, schemes: &[&str]) -> Result<String> {
    let value = matches
        .get_one::<String>(id)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("missing required argument: --{id}"))?;
    // Never echo the URL itself; it may carry credentials.
    let parsed = Url::parse(&value).with_context(|| format!("invalid URL for --{id}"))?;
    if !schemes.contains(&parsed.scheme()) {
        bail!(
            "unsupported scheme '{}' for --{id}, expected one of: {}",
            parsed.scheme(),
            schemes.join(", ")
        );
    }
    Ok(value)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string (users and records)")
                .env("GATEHOUSE_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_REDIS_URL)
                .long(ARG_REDIS_URL)
                .help("Redis URL for the session store, example: redis://127.0.0.1:6379/0")
                .env("GATEHOUSE_REDIS_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_MS)
                .long(ARG_STORE_TIMEOUT_MS)
                .help("Timeout for every database and session store call, in milliseconds")
                .env("GATEHOUSE_STORE_TIMEOUT_MS")
                .default_value("2000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

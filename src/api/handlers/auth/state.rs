//! Auth state and configuration.
//!
//! Configuration is built once at startup and injected; handlers never read
//! the process environment.

use anyhow::{Result, bail};
use std::{sync::Arc, time::Duration};
use tracing::warn;

use super::{password::CredentialVerifier, token::TokenMinter};
use crate::{identity::UserStore, store::SessionStore};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_ttl: Duration,
    refresh_ttl: Duration,
    cookie_secure: bool,
    store_timeout: Duration,
}

impl AuthConfig {
    /// Build a config from token max ages in minutes.
    ///
    /// # Errors
    /// Returns an error if either max age is zero.
    pub fn new(access_minutes: u64, refresh_minutes: u64) -> Result<Self> {
        if access_minutes == 0 {
            bail!("access token max age must be at least one minute");
        }
        if refresh_minutes == 0 {
            bail!("refresh token max age must be at least one minute");
        }
        if access_minutes >= refresh_minutes {
            warn!(
                access_minutes,
                refresh_minutes, "access token max age is not shorter than refresh token max age"
            );
        }

        Ok(Self {
            access_ttl: Duration::from_secs(access_minutes.saturating_mul(60)),
            refresh_ttl: Duration::from_secs(refresh_minutes.saturating_mul(60)),
            cookie_secure: false,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    pub(super) fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    pub(super) fn access_max_age_seconds(&self) -> u64 {
        self.access_ttl.as_secs()
    }

    pub(super) fn refresh_max_age_seconds(&self) -> u64 {
        self.refresh_ttl.as_secs()
    }
}

/// Everything the auth handlers share: config, both stores, the verifier and
/// the minter. Built once and handed out behind an `Arc`.
pub struct AuthState {
    config: AuthConfig,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
    minter: TokenMinter,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let minter = TokenMinter::new(config.access_ttl(), config.refresh_ttl());
        Self {
            config,
            sessions,
            users,
            verifier: CredentialVerifier::new(),
            minter,
        }
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: CredentialVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    pub(super) fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub(super) fn minter(&self) -> &TokenMinter {
        &self.minter
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

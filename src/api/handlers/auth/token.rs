//! Token minting.
//!
//! Tokens are opaque: no claims, no signature. They mean something only while
//! the session store holds an entry for them, which is what makes logout a
//! real revocation.

use std::{fmt, time::Duration};

use super::utils::{generate_token, unix_now};
use crate::{
    api::error::AuthError,
    store::{SessionKey, TokenKind},
};

/// One issued token. Immutable for its lifetime.
#[derive(Clone)]
pub struct SessionToken {
    pub token_id: String,
    pub user_id: i64,
    pub kind: TokenKind,
    /// Unix seconds.
    pub expires_at: u64,
    pub ttl: Duration,
}

impl SessionToken {
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.kind, &self.token_id)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("key", &self.key())
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct TokenMinter {
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenMinter {
    #[must_use]
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access_ttl,
            refresh_ttl,
        }
    }

    /// # Errors
    /// Returns `AuthError::TokenGeneration` if the RNG fails.
    pub fn mint_access(&self, user_id: i64) -> Result<SessionToken, AuthError> {
        self.mint(user_id, TokenKind::Access)
    }

    /// # Errors
    /// Returns `AuthError::TokenGeneration` if the RNG fails.
    pub fn mint_refresh(&self, user_id: i64) -> Result<SessionToken, AuthError> {
        self.mint(user_id, TokenKind::Refresh)
    }

    #[must_use]
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn mint(&self, user_id: i64, kind: TokenKind) -> Result<SessionToken, AuthError> {
        let ttl = self.ttl(kind);
        Ok(SessionToken {
            token_id: generate_token()?,
            user_id,
            kind,
            expires_at: unix_now()?.saturating_add(ttl.as_secs()),
            ttl,
        })
    }
}
